pub const DEFAULT_MESSAGE: &str = "This is the default page.";

const DEFAULT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Chaos Backend</title>
</head>
<body>
    <h1>This is the default page.</h1>
    <p>Fault endpoints: /slow, /error, /reset, /new</p>
</body>
</html>
"#;

pub fn default_page() -> &'static str {
    DEFAULT_PAGE
}
