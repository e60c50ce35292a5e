//! Core-pinned worker threads.
//!
//! ESP-IDF implements `std::thread` on pthreads over FreeRTOS tasks.
//! `esp_pthread_set_cfg()` configures the *next* `pthread_create()` from the
//! calling thread, so the config→spawn pair must not interleave with other
//! thread creation on that thread. On non-ESP targets core and priority are
//! ignored.

use std::io;
use std::thread::JoinHandle;

/// CPU cores of the ESP32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// WiFi, lwIP and the HomeKit server.
    Pro = 0,
    /// Button/LED poll loop and the reset worker.
    App = 1,
}

/// A worker thread's placement and budget.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// Null-terminated for FreeRTOS, e.g. `"reset\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: the config struct outlives the call; `name` is 'static and
    // null-terminated.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as _;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_sys::esp!(esp_idf_sys::esp_pthread_set_cfg(&cfg))
    };
    ret.map_err(|e| io::Error::other(format!("esp_pthread_set_cfg failed: {e}")))?;

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
}

#[cfg(not(target_os = "espidf"))]
pub fn spawn(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
}
