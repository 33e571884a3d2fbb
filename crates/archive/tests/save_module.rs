#[test]
fn save_module_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/save_module_pass.rs");
}
