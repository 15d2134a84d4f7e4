use crate::config::CONFIG_FILE;
use crate::error::Error;

/// ANSI bold for headings.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::AssetRootOutsideContent { asset_root, content_root } => {
            render_asset_root_outside(&asset_root.display().to_string(), &content_root.display().to_string())
        },
        Error::Io(err) => format!(
            "\
# Error: I/O

{err}
"
        ),
        Error::Json(err) => format!(
            "\
# Error: Report Serialization

{err}
"
        ),
        Error::RootNotFound { path, role } => render_root_not_found(&path.display().to_string(), role),
        Error::RootUnreadable { path, role, source } => format!(
            "\
# Error: Directory Unreadable

The {role} `{}` exists but cannot be read: {source}

## Fix

Check the directory's permissions, then run again.
",
            path.display()
        ),
        Error::TomlDe(err) => format!(
            "\
# Error: Invalid `{CONFIG_FILE}`

{err}

## Fix

Correct the file, or delete it to use the defaults.
"
        ),
    };
}

fn render_asset_root_outside(asset_root: &str, content_root: &str) -> String {
    return format!(
        "\
# Error: Asset Root Outside Content Root

`{asset_root}` is not inside `{content_root}`, so asset paths cannot be
written relative to the documents.

## Fix

Move the assets under the content root, or point `--assets` at a directory
inside it:

    docrelink --root {content_root} --assets {content_root}/assets migrate
"
    );
}

fn render_root_not_found(path: &str, role: &str) -> String {
    let flag = match role {
        "asset root" => "--assets",
        "asset source" => "--from",
        _ => "--root",
    };
    return format!(
        "\
# Error: Directory Not Found

The {role} `{path}` does not exist or is not a directory.

## Fix

Pass the right directory with `{flag}`, or set it in `{CONFIG_FILE}`.
"
    );
}
