//! GPIO drivers and task helpers.

pub mod button;
pub mod led_patterns;
pub mod relay;
pub mod status_led;
pub mod task_pin;
