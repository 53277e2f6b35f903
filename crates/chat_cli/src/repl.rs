//! Line-oriented chat loop.
//!
//! Reads one prompt per line, streams the reply to `out` as deltas arrive and
//! handles slash commands locally.

use std::io::{self, BufRead, Write};

use agui_chat::{ChatController, Message, Role, SubmitOutcome, SubmitRejection};

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};

const ASSISTANT_PREFIX: &str = "assistant> ";

/// Prints transcript growth incrementally.
///
/// Messages are append-only and only the newest one grows, so a cursor into
/// the list plus a byte offset into its content is enough.
#[derive(Debug, Default)]
struct StreamPrinter {
    cursor: usize,
    printed: Option<usize>,
}

impl StreamPrinter {
    fn skip_to(&mut self, len: usize) {
        self.cursor = len;
        self.printed = None;
    }

    fn flush<W: Write>(&mut self, messages: &[Message], out: &mut W) -> io::Result<()> {
        while let Some(message) = messages.get(self.cursor) {
            let printed = match self.printed {
                Some(printed) => printed,
                None => {
                    write!(out, "{}", prefix_for(message))?;
                    0
                }
            };
            if let Some(tail) = message.content.get(printed..) {
                write!(out, "{tail}")?;
            }
            self.printed = Some(message.content.len());

            if self.cursor + 1 < messages.len() {
                writeln!(out)?;
                self.skip_to(self.cursor + 1);
            } else {
                break;
            }
        }
        out.flush()
    }

    fn finish<W: Write>(&mut self, messages: &[Message], out: &mut W) -> io::Result<()> {
        self.flush(messages, out)?;
        if self.printed.is_some() {
            writeln!(out)?;
        }
        self.skip_to(messages.len());
        out.flush()
    }
}

fn prefix_for(message: &Message) -> &'static str {
    match message.role {
        Role::Assistant => ASSISTANT_PREFIX,
        Role::User => "you> ",
    }
}

/// Runs the loop until `/quit` or end of input.
pub fn run_repl<R, W>(controller: &mut ChatController, input: R, out: &mut W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut printer = StreamPrinter::default();

    for line in input.lines() {
        let line = line?;

        if let Some(command) = parse_slash_command(&line) {
            match command {
                SlashCommand::Help => writeln!(out, "{HELP_TEXT}")?,
                SlashCommand::Clear => {
                    if controller.clear() {
                        printer.skip_to(0);
                        writeln!(out, "(conversation cleared)")?;
                    } else {
                        writeln!(out, "(cannot clear while a reply is streaming)")?;
                    }
                }
                SlashCommand::History => print_history(controller.messages(), out)?,
                SlashCommand::Quit => break,
                SlashCommand::Unknown(name) => {
                    writeln!(out, "Unknown command {name}. Type /help for commands.")?
                }
            }
            continue;
        }

        match controller.submit(&line) {
            SubmitOutcome::Accepted { .. } => {
                printer.skip_to(controller.messages().len());
                let mut write_error = None;
                controller.run_until_idle(|state, _event| {
                    if write_error.is_none() {
                        if let Err(error) = printer.flush(state.messages(), out) {
                            write_error = Some(error);
                        }
                    }
                });
                if let Some(error) = write_error {
                    return Err(error);
                }
                printer.finish(controller.messages(), out)?;
            }
            SubmitOutcome::Ignored(SubmitRejection::Empty) => {}
            SubmitOutcome::Ignored(SubmitRejection::Busy) => {
                writeln!(out, "(still waiting for the previous reply)")?
            }
        }
    }

    out.flush()
}

fn print_history<W: Write>(messages: &[Message], out: &mut W) -> io::Result<()> {
    if messages.is_empty() {
        return writeln!(out, "(no messages yet)");
    }
    for message in messages {
        writeln!(out, "{}{}", prefix_for(message), message.content)?;
    }
    Ok(())
}
