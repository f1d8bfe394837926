#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse or validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<balancer_config::Config>(data) {
        let _ = cfg.validate();
    }
});
