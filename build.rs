fn main() {
    // Emit the ESP-IDF link environment only for device builds; host
    // builds (tests, tooling) skip it entirely.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
