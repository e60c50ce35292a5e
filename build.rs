fn main() {
    println!("cargo:rerun-if-changed=components/homekit_bridge");

    // Host builds (tests, simulation) have no ESP-IDF environment to export.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
