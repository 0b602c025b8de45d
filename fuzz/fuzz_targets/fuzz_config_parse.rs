#![no_main]

use libfuzzer_sys::fuzz_target;
use scopedb::EngineConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = EngineConfig::parse(s) {
            assert!(!config.database.is_empty());
            let _ = config.driver_options();
        }
    }
});
