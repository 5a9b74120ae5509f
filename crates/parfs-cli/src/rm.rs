use eyre::{bail, Context, Result};
use parfs_core::ops::DeleteOp;
use parfs_core::ProgressCounters;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use crate::cli::RmArgs;
use crate::context::AppContext;
use crate::summary::print_summary;

pub fn run_rm(ctx: &AppContext, args: &RmArgs) -> Result<()> {
    let root = std::path::absolute(&args.path)
        .with_context(|| format!("resolving {}", args.path.display()))?;
    if root.parent().is_none() {
        bail!("refusing to delete the filesystem root");
    }
    if !args.yes {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        if !confirm(&root, &mut stdin.lock(), &mut stdout)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let counters = Arc::new(ProgressCounters::new());
    let summary = ctx.run_walk("rm", &root, &DeleteOp, counters)?;
    print_summary("Delete", &summary, false);
    Ok(())
}

/// Ask until the answer is yes or no. End of input counts as no.
fn confirm<R: BufRead, W: Write>(root: &Path, input: &mut R, output: &mut W) -> Result<bool> {
    loop {
        write!(
            output,
            "Delete {} and everything below it? [yes/no]: ",
            root.display()
        )?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please answer yes or no.")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answers: &str) -> (bool, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let decision = confirm(Path::new("/data/old"), &mut input, &mut output).unwrap();
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn accepts_y_and_yes() {
        assert!(ask("y\n").0);
        assert!(ask("YES\n").0);
    }

    #[test]
    fn repeats_until_a_clear_answer() {
        let (decision, transcript) = ask("maybe\n\nno\n");
        assert!(!decision);
        assert_eq!(transcript.matches("Delete /data/old").count(), 3);
        assert_eq!(transcript.matches("Please answer yes or no.").count(), 2);
    }

    #[test]
    fn end_of_input_declines() {
        assert!(!ask("").0);
    }
}
