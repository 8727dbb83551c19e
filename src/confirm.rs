use std::io::{self, BufRead, Write};

/// Asks a human whether to go on.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Asks on an output stream and reads answers line by line, until the
/// answer is either `y` or `n`. Running out of input means `n`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "\n{} (y/n)\n: ", question)?;
        self.output.flush()?;
        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        Ok(Some(answer.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Confirm for Prompter<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        loop {
            match self.ask(question) {
                Ok(Some(answer)) if answer == "y" => return true,
                Ok(Some(answer)) if answer == "n" => return false,
                Ok(Some(_)) => {
                    let _ = writeln!(self.output, "Please answer y or n");
                }
                Ok(None) => return false,
                Err(e) => {
                    tracing::warn!("Failed to read answer: {}", e);
                    return false;
                }
            }
        }
    }
}
