//! The human running the migration.

use std::io;

/// Everything the migration says to, or asks of, the person running it
///
/// The orchestrator never touches stdin or stdout directly, so a run can be driven by a
/// terminal, a script, or a test.
pub trait Operator: Send {
    /// Ask a free-form question, returning the answer without its line ending
    ///
    /// End of input is an empty answer.
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Show a line of output
    fn say(&mut self, message: &str);

    /// Ask a yes/no question; anything but an explicit yes is a no
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{question} (y/n): "))?;
        Ok(is_affirmative(&answer))
    }
}

/// `y` or `yes`, ignoring case and surrounding whitespace
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

impl<O: Operator + ?Sized> Operator for &mut O {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        (**self).ask(question)
    }

    fn say(&mut self, message: &str) {
        (**self).say(message)
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        (**self).confirm(question)
    }
}
