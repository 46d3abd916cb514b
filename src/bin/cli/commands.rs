use courier_stomp::{AckMode, Client, ConnError, ConnectOptions, Delivery, Message};

use super::args::{SendArgs, SubscribeArgs};
use super::exit_codes;

/// `courier send`: connect, send one message, disconnect.
pub async fn send(args: SendArgs) -> Result<(), (String, u8)> {
    let opts = parse_options(&args.dsn)?;
    let addr = opts.addr.clone();
    let client = Client::connect(opts)
        .await
        .map_err(|e| format_connection_error(&e, &addr))?;

    let mut msg = Message::new(args.body).to(args.destination.as_str());
    for (k, v) in args.headers {
        msg.set_header(k, v);
    }
    let delivery = if args.confirm {
        Delivery::Confirmed
    } else {
        Delivery::FireAndForget
    };
    client
        .send(&mut msg, delivery)
        .await
        .map_err(|e| format_connection_error(&e, &addr))?;

    println!(
        "Sent {} to {}{}",
        msg.id().unwrap_or_default(),
        args.destination,
        if args.confirm { " (confirmed)" } else { "" }
    );

    client
        .disconnect()
        .await
        .map_err(|e| format_connection_error(&e, &addr))
}

/// `courier subscribe`: print every message until Ctrl-C, acknowledging
/// each one when the ack mode asks for it.
pub async fn subscribe(args: SubscribeArgs) -> Result<(), (String, u8)> {
    let opts = parse_options(&args.dsn)?;
    let addr = opts.addr.clone();
    let client = Client::connect(opts)
        .await
        .map_err(|e| format_connection_error(&e, &addr))?;

    let acker = client.clone();
    let ack = args.ack;
    let id = client
        .subscribe(&args.destination, ack, move |msg: Message| {
            let acker = acker.clone();
            async move {
                print_message(&msg);
                if ack != AckMode::Auto {
                    if let Err(e) = acker.ack(&msg).await {
                        eprintln!("Failed to ack {}: {}", msg.id().unwrap_or("?"), e);
                    }
                }
            }
        })
        .await
        .map_err(|e| format_connection_error(&e, &addr))?;

    println!("Subscribed to {} as {} (Ctrl-C to stop)", args.destination, id);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            err = client.next_error() => match err {
                Some(ConnError::Server(e)) => eprintln!("[BROKER ERROR] {}", e),
                Some(e) => return Err(format_connection_error(&e, &addr)),
                None => {
                    return Err((
                        "Connection closed by server".to_string(),
                        exit_codes::NETWORK_ERROR,
                    ));
                }
            }
        }
    }

    println!("Disconnecting...");
    client
        .disconnect()
        .await
        .map_err(|e| format_connection_error(&e, &addr))
}

fn parse_options(dsn: &str) -> Result<ConnectOptions, (String, u8)> {
    dsn.parse::<ConnectOptions>()
        .map_err(|e| (format!("Invalid broker descriptor: {}", e), exit_codes::CONFIG_ERROR))
}

fn print_message(msg: &Message) {
    println!("[{}] MESSAGE", msg.destination().unwrap_or("?"));
    for (k, v) in msg.headers() {
        println!("  {}: {}", k, v);
    }
    if !msg.body().is_empty() {
        match std::str::from_utf8(msg.body()) {
            Ok(s) => println!("  Body: {}", s),
            Err(_) => println!("  Body: ({} bytes, binary)", msg.body().len()),
        }
    }
}

/// Format a connection error with user-friendly messaging
fn format_connection_error(err: &ConnError, address: &str) -> (String, u8) {
    match err {
        ConnError::Io(io_err) => {
            let message = match io_err.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    format!("Connection refused: {}", address)
                }
                std::io::ErrorKind::TimedOut => {
                    format!("Connection timed out: {}", address)
                }
                _ => {
                    format!("Connection failed: {}", io_err)
                }
            };
            (message, exit_codes::NETWORK_ERROR)
        }
        ConnError::ConnectTimeout => (
            format!("Connection timed out: {}", address),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::Tls(msg) => (format!("TLS error: {}", msg), exit_codes::NETWORK_ERROR),
        ConnError::ConnectionClosed | ConnError::HeartbeatTimeout => (
            format!("Connection lost: {}", err),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::ServerRejected(server_err) => {
            let mut message = format!("Authentication failed: {}", server_err.message);
            if let Some(body) = &server_err.body {
                message.push_str(&format!(" ({})", body));
            }
            (message, exit_codes::AUTH_ERROR)
        }
        other => (other.to_string(), exit_codes::PROTOCOL_ERROR),
    }
}
