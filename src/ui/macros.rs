use std::fmt::Display;
use termion::color;

/// Status line with the right-aligned colored category column every
/// command prints.
pub fn compose(category_color: impl Display, category: &str, message: impl Display) -> String {
    format!(
        "{}{:>12}{} {}",
        category_color,
        category,
        color::Fg(color::Reset),
        message
    )
}

pub fn to_stdout(category_color: impl Display, category: &str, message: impl Display) {
    println!("{}", compose(category_color, category, message));
}

pub fn to_stderr(category_color: impl Display, category: &str, message: impl Display) {
    eprintln!("{}", compose(category_color, category, message));
}

#[macro_export]
macro_rules! blog {
    ($category:expr, $($arg:tt)*) => {
        $crate::ui::macros::to_stdout(
            termion::color::Fg(termion::color::Green),
            $category,
            format_args!($($arg)*),
        )
    };
}

/// Warnings go to stderr so a redirected run keeps the bibliography
/// output clean.
#[macro_export]
macro_rules! blog_warning {
    ($category:expr, $($arg:tt)*) => {
        $crate::ui::macros::to_stderr(
            termion::color::Fg(termion::color::Yellow),
            $category,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! blog_working {
    ($category:expr, $($arg:tt)*) => {
        $crate::ui::macros::to_stdout(
            termion::color::Fg(termion::color::Blue),
            $category,
            format_args!($($arg)*),
        )
    };
}

#[macro_export]
macro_rules! blog_done {
    ($category:expr, $($arg:tt)*) => {
        $crate::ui::macros::to_stdout(
            termion::color::Fg(termion::color::Green),
            $category,
            format_args!($($arg)*),
        )
    };
}

pub use blog;
pub use blog_done;
pub use blog_warning;
pub use blog_working;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_is_right_aligned_and_colored() {
        let line = compose(color::Fg(color::Green), "Done", "output written");
        assert!(line.contains("        Done"));
        assert!(line.starts_with(&format!("{}", color::Fg(color::Green))));
        assert!(line.ends_with(&format!(
            "{} output written",
            color::Fg(color::Reset)
        )));
    }

    #[test]
    fn long_categories_are_not_truncated() {
        let line = compose(color::Fg(color::Yellow), "Normalizing", "x");
        assert!(line.contains(" Normalizing"));
        assert!(line.ends_with(" x"));
    }
}
