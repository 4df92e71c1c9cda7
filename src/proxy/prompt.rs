use console::Term;
use std::io::{self, IsTerminal};

/// Source of interactively entered Webshare credentials.
///
/// `Ok(None)` means the input stream was closed before an answer arrived.
pub trait CredentialPrompt {
    fn read_username(&mut self) -> io::Result<Option<String>>;

    fn read_password(&mut self) -> io::Result<Option<String>>;
}

/// Prompts on the controlling terminal; the password is read without echo
pub struct TerminalPrompt {
    term: Term,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    /// Whether a human can answer prompts on this terminal
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal() && Term::stderr().is_term()
    }

    fn ask(&self, question: &str, secure: bool) -> io::Result<Option<String>> {
        self.term.write_str(question)?;

        let answer = if secure {
            self.term.read_secure_line()
        } else {
            self.term.read_line()
        };

        match answer {
            Ok(line) => Ok(Some(line)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl CredentialPrompt for TerminalPrompt {
    fn read_username(&mut self) -> io::Result<Option<String>> {
        self.ask(
            "Webshare username (press Enter to skip, type 'cancel' to abort): ",
            false,
        )
    }

    fn read_password(&mut self) -> io::Result<Option<String>> {
        self.ask(
            "Webshare password (press Enter to skip, type 'cancel' to abort): ",
            true,
        )
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}
