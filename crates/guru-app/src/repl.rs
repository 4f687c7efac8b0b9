//! Line-oriented terminal chat client.

use tokio::io::{AsyncBufReadExt, BufReader};

use guru_chat::{ChatSession, ThreadState};
use guru_core::types::Role;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    New,
    List,
    /// 1-based position in the list.
    Switch(usize),
    Delete(usize),
    Quit,
    Say(String),
    Invalid(String),
    Empty,
}

pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if !line.starts_with('/') {
        return ReplCommand::Say(line.to_string());
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let index = parts.next().and_then(|n| n.parse::<usize>().ok()).filter(|n| *n > 0);

    match (command, index) {
        ("/new", _) => ReplCommand::New,
        ("/list", _) => ReplCommand::List,
        ("/quit" | "/exit", _) => ReplCommand::Quit,
        ("/switch", Some(n)) => ReplCommand::Switch(n),
        ("/delete", Some(n)) => ReplCommand::Delete(n),
        ("/switch" | "/delete", None) => {
            ReplCommand::Invalid(format!("usage: {} <number from /list>", command))
        }
        _ => ReplCommand::Invalid(format!("unknown command {}", command)),
    }
}

/// Read lines from stdin until `/quit` or end of input.
pub async fn run(session: ChatSession) -> std::io::Result<()> {
    println!("Guru chat. Commands: /new /list /switch <n> /delete <n> /quit");
    print_list(&session).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::New => {
                session.start_new().await;
                println!("(new conversation)");
            }
            ReplCommand::List => print_list(&session).await,
            ReplCommand::Switch(n) => match conversation_id(&session, n).await {
                Some(id) => match session.select(&id).await {
                    Ok(()) => print_active(&session).await,
                    Err(e) => println!("{}", e),
                },
                None => println!("no conversation #{}", n),
            },
            ReplCommand::Delete(n) => match conversation_id(&session, n).await {
                Some(id) => match session.delete(&id).await {
                    Ok(()) => print_list(&session).await,
                    Err(e) => println!("{}", e),
                },
                None => println!("no conversation #{}", n),
            },
            ReplCommand::Invalid(msg) => println!("{}", msg),
            ReplCommand::Say(text) => match session.send(&text).await {
                Some(reply) => {
                    if let Some(reasoning) = reply.reasoning.as_deref() {
                        println!("\n[reasoning]\n{}\n", reasoning);
                    }
                    println!("guru> {}\n", reply.content);
                }
                None => println!("(still waiting for the previous reply)"),
            },
        }
    }

    session.wait_for_titles().await;
    Ok(())
}

async fn conversation_id(session: &ChatSession, n: usize) -> Option<String> {
    session
        .snapshot()
        .await
        .conversations
        .get(n - 1)
        .map(|c| c.id.clone())
}

async fn print_list(session: &ChatSession) {
    let snap = session.snapshot().await;
    if snap.conversations.is_empty() {
        println!("(no conversations yet)");
        return;
    }
    for (i, conv) in snap.conversations.iter().enumerate() {
        let marker = if snap.active_id.as_deref() == Some(conv.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {:>2}. {}", marker, i + 1, conv.title);
    }
}

async fn print_active(session: &ChatSession) {
    let snap = session.snapshot().await;
    let Some(conv) = snap
        .active_id
        .as_deref()
        .and_then(|id| snap.conversations.iter().find(|c| c.id == id))
    else {
        return;
    };

    println!("== {} ==", conv.title);
    for msg in &conv.messages {
        let who = match msg.role {
            Role::User => "you",
            Role::Assistant => "guru",
        };
        println!("{}> {}", who, msg.content);
    }
    if snap.state == ThreadState::AwaitingResponse {
        println!("(reply pending)");
    }
}
