#![no_main]
use libfuzzer_sys::fuzz_target;
use formcheck::{populate, stripped, validate, NoCustomValidity, Request};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    // first line is the submitted value, the rest is the form
    let (value, markup) = s.split_once('\n').unwrap_or(("", s));
    if let Ok(mut doc) = formcheck::from_str(markup) {
        let names: Vec<String> = doc
            .named_controls()
            .into_iter()
            .filter_map(|id| doc.attr(id, "name").map(str::to_string))
            .collect();
        let request = names
            .iter()
            .fold(Request::post(), |request, name| request.field(name, value));
        populate(&mut doc, &request);
        let _ = validate(&mut doc, "fuzz", &NoCustomValidity);
        let _ = stripped(&doc);
    }
});
