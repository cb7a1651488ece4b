fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        let mut res = winresource::WindowsResource::new();
        res.set("ProductName", "Deskloop");
        res.set("FileDescription", "Deskloop Wallpaper Engine");
        if let Err(e) = res.compile() {
            println!("cargo:warning=failed to embed version resource: {e}");
        }
    }
}
