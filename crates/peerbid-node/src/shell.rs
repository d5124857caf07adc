//! Line-oriented operator shell.
//!
//! Every command runs as the node's own display name: it is the seller for
//! `auction new`, the bidder for `auction bid`, and the caller for
//! `auction complete`.

use std::fmt::Write as _;
use std::sync::Arc;

use peerbid_core::{AuctionId, AuctionRecord, Price};
use peerbid_market::Committed;
use peerbid_p2p::BroadcastReport;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::context::NodeContext;

const HELP: &str = "\
commands:
  auction new <price> <item...>   open an auction
  auction bid <id> <amount>       bid on an auction
  auction complete <id>           close your auction to the leading bid
  auction list                    list known auctions
  auction show <id>               show one auction and its bids
  peers                           list known peers
  help                            show this help
  exit                            leave the shell";

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open an auction.
    New {
        /// Starting price.
        price: Price,
        /// Item name.
        item: String,
    },
    /// Bid on an auction.
    Bid {
        /// Target auction.
        auction_id: AuctionId,
        /// Bid amount.
        amount: Price,
    },
    /// Close an auction.
    Complete {
        /// Target auction.
        auction_id: AuctionId,
    },
    /// List auctions.
    List,
    /// Show one auction.
    Show {
        /// Target auction.
        auction_id: AuctionId,
    },
    /// List peers.
    Peers,
    /// Print help.
    Help,
    /// Leave the shell.
    Exit,
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for the operator if the line is not a
    /// valid command.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            [] => return Ok(None),
            ["help"] => Self::Help,
            ["exit" | "quit"] => Self::Exit,
            ["peers"] => Self::Peers,
            ["auction", "list"] => Self::List,
            ["auction", "show", id] => Self::Show {
                auction_id: parse_id(id)?,
            },
            ["auction", "complete", id] => Self::Complete {
                auction_id: parse_id(id)?,
            },
            ["auction", "bid", id, amount] => Self::Bid {
                auction_id: parse_id(id)?,
                amount: parse_price(amount)?,
            },
            ["auction", "new", price, item @ ..] if !item.is_empty() => Self::New {
                price: parse_price(price)?,
                item: item.join(" "),
            },
            _ => return Err(format!("unrecognised command '{}', try 'help'", line.trim())),
        };
        Ok(Some(command))
    }
}

fn parse_id(raw: &str) -> Result<AuctionId, String> {
    AuctionId::parse(raw).map_err(|e| e.to_string())
}

fn parse_price(raw: &str) -> Result<Price, String> {
    raw.parse::<Price>().map_err(|e| e.to_string())
}

/// What the shell should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print the text and keep reading.
    Continue(String),
    /// Stop reading.
    Exit,
}

/// Operator shell bound to one node.
#[derive(Debug, Clone)]
pub struct Shell {
    ctx: Arc<NodeContext>,
}

impl Shell {
    /// Creates a shell acting as the node's operator.
    #[must_use]
    pub const fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    /// Parses and runs one line.
    pub async fn execute_line(&self, line: &str) -> Reply {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Reply::Continue(String::new()),
            Err(message) => Reply::Continue(message),
        }
    }

    /// Runs one command.
    pub async fn execute(&self, command: Command) -> Reply {
        let me = self.ctx.operator();
        let coordinator = &self.ctx.coordinator;
        let text = match command {
            Command::Exit => return Reply::Exit,
            Command::Help => HELP.to_string(),
            Command::Peers => self.peers(),
            Command::List => match coordinator.auctions().await {
                Ok(auctions) if auctions.is_empty() => "no auctions".to_string(),
                Ok(auctions) => auctions.iter().map(summary).collect::<Vec<_>>().join("\n"),
                Err(e) => format!("error: {e}"),
            },
            Command::Show { auction_id } => match coordinator.auction(&auction_id).await {
                Ok(record) => details(&record),
                Err(e) => format!("error: {e}"),
            },
            Command::New { price, item } => match coordinator.initialize(&item, price, me).await {
                Ok(Committed { value, broadcast }) => format!(
                    "opened auction {} for '{}' at {}{}",
                    value.auction_id,
                    value.item,
                    value.starting_price,
                    propagation(&broadcast)
                ),
                Err(e) => format!("error: {e}"),
            },
            Command::Bid { auction_id, amount } => {
                match coordinator.place_bid(&auction_id, amount, me).await {
                    Ok(Committed { value, broadcast }) => format!(
                        "bid {} on {} accepted{}",
                        value.amount,
                        value.auction_id,
                        propagation(&broadcast)
                    ),
                    Err(e) => format!("error: {e}"),
                }
            }
            Command::Complete { auction_id } => match coordinator.complete(&auction_id, me).await {
                Ok(Committed { value, broadcast }) => {
                    let sold = value
                        .outcome
                        .as_ref()
                        .map(|o| format!("sold to {} for {}", o.winner, o.price))
                        .unwrap_or_default();
                    format!("auction {} closed, {sold}{}", value.auction_id, propagation(&broadcast))
                }
                Err(e) => format!("error: {e}"),
            },
        };
        Reply::Continue(text)
    }

    /// Reads commands from `input` until `exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        loop {
            output.write_all(b"> ").await?;
            output.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.execute_line(&line).await {
                Reply::Exit => break,
                Reply::Continue(text) if text.is_empty() => {}
                Reply::Continue(text) => {
                    output.write_all(text.as_bytes()).await?;
                    output.write_all(b"\n").await?;
                }
            }
        }
        output.flush().await
    }

    fn peers(&self) -> String {
        let local = self.ctx.local();
        let mut text = String::new();
        for peer in self.ctx.registry.all() {
            let marker = if peer.address == local.address { " (you)" } else { "" };
            let _ = writeln!(text, "{peer}{marker}");
        }
        text.trim_end().to_string()
    }
}

fn summary(record: &AuctionRecord) -> String {
    let leading = record
        .leading_bid()
        .map_or_else(|| "no bids".to_string(), |bid| format!("leading {} by {}", bid.amount, bid.bidder));
    format!(
        "{} [{}] '{}' by {}, from {}, {leading}",
        record.auction_id, record.status, record.item, record.seller, record.starting_price
    )
}

fn details(record: &AuctionRecord) -> String {
    let mut text = summary(record);
    if let Some(outcome) = &record.outcome {
        let _ = write!(text, "\n  sold to {} for {}", outcome.winner, outcome.price);
    }
    for bid in &record.bids {
        let _ = write!(
            text,
            "\n  {} bid {} at {}",
            bid.bidder,
            bid.amount,
            bid.placed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    text
}

fn propagation(report: &BroadcastReport) -> String {
    if report.targeted() == 0 {
        String::new()
    } else {
        format!(" (reached {}/{} peers)", report.delivered(), report.targeted())
    }
}
