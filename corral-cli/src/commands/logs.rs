//! Log streaming command.

use crate::context::AppContext;
use anyhow::Result;
use colored::Colorize;
use corral_core::LogEnd;

pub async fn logs(service: Option<&str>, follow: bool, tail: usize) -> Result<()> {
    let ctx = AppContext::init().await?;
    let mut stream = ctx.lifecycle.logs(service, follow, tail).await?;

    let end = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break stream.cancel();
            }
            line = stream.next_line() => {
                match line? {
                    Some(line) => println!("{}", line),
                    None => break LogEnd::Eof,
                }
            }
        }
    };

    if end == LogEnd::Cancelled {
        println!();
        println!("{}", "Log streaming cancelled".dimmed());
    }
    Ok(())
}
