fn main() {
    println!("cargo:rerun-if-env-changed=SAPNWRFC_HOME");
    if std::env::var_os("CARGO_FEATURE_NWRFC").is_none() {
        return;
    }
    if let Some(home) = std::env::var_os("SAPNWRFC_HOME") {
        let lib = std::path::Path::new(&home).join("lib");
        println!("cargo:rustc-link-search=native={}", lib.display());
    }
}
