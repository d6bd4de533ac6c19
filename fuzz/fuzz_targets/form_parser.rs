#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(doc) = formcheck::from_bytes(data) {
        let markup = doc.to_markup();
        // serialized output must parse back
        assert!(formcheck::from_str(&markup).is_ok(), "{markup}");
    }
});
