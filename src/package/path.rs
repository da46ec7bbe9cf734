/// Resolve `relative` against the file at `base`, both archive paths.
///
/// The base's file name is dropped, then each `/`-separated segment of
/// `relative` is applied: `.` and empty segments are ignored, `..` pops one
/// directory (never above the archive root), anything else is pushed. A
/// leading `/` resolves from the archive root.
///
/// ```
/// use folio::package::resolve_relative_path;
///
/// assert_eq!(resolve_relative_path("folder/chapter1.xhtml", "../images/cover.jpg"), "images/cover.jpg");
/// assert_eq!(resolve_relative_path("chapter1.xhtml", "./img.png"), "img.png");
/// ```
pub fn resolve_relative_path(base: &str, relative: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();

    if !relative.starts_with('/') {
        // Drop the file name; a base ending in '/' names a directory
        let base_dir = match base.rfind('/') {
            Some(i) => &base[..i],
            None => "",
        };
        push_segments(&mut stack, base_dir);
    }
    push_segments(&mut stack, relative);

    stack.join("/")
}

fn push_segments<'a>(stack: &mut Vec<&'a str>, path: &'a str) {
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }
}
