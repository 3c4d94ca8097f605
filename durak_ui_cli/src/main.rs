mod cli_player;

use std::{
    error::Error,
    io::{self, BufRead},
    net::{SocketAddr, UdpSocket},
    sync::mpsc,
    thread,
    time::{Duration, Instant, SystemTime},
};

use cli_player::{CliAction, CliPlayer};
use durak_core::{config::EngineConfig, event::Event, replica::Replica, user_name::Username};
use log::warn;
use renet::{
    transport::{ClientAuthentication, NetcodeClientTransport},
    ConnectionConfig, DefaultChannel, RenetClient,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let usage = "Usage: durak_ui_cli SERVER_ADDR USERNAME [CONFIG_JSON]";
    let server_addr: SocketAddr = args.get(1).ok_or(usage)?.parse()?;
    let username = Username::from_string(args.get(2).ok_or(usage)?.clone());
    let config = match args.get(3) {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let mut client = RenetClient::new(ConnectionConfig::default());
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let current_time = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
    let authentication = ClientAuthentication::Unsecure {
        server_addr,
        client_id: current_time.as_millis() as u64,
        user_data: Some(username.to_netcode_user_data()),
        protocol_id: 0,
    };
    let mut transport = NetcodeClientTransport::new(current_time, authentication, socket)?;

    let (lines_tx, lines_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    let player = CliPlayer;
    let mut replica = Replica::new(username.clone(), &config);
    let mut last_updated = Instant::now();
    println!("connecting to {} as {}, h for help", server_addr, username);

    loop {
        let now = Instant::now();
        let duration = now - last_updated;
        last_updated = now;

        client.update(duration);
        transport.update(duration, &mut client)?;

        if client.is_connected() {
            while let Some(message) = client.receive_message(DefaultChannel::ReliableOrdered) {
                let event = String::from_utf8(message.into())
                    .map_err(|e| e.to_string())
                    .and_then(|text| Event::from_json(&text).map_err(|e| e.to_string()));
                match event {
                    Ok(event) => {
                        player.print_event(&event);
                        match replica.receive(&event) {
                            Ok(update) => player.print_update(&update),
                            Err(e) => println!("! {}, waiting for the next snapshot", e),
                        }
                    }
                    Err(e) => warn!("dropped message: {}", e),
                }
            }

            for intent in replica.expire(now) {
                println!("! no answer for {:?}, undone", intent);
            }

            while let Ok(line) = lines_rx.try_recv() {
                match line.parse::<CliAction>() {
                    Ok(CliAction::Quit) => {
                        transport.disconnect();
                        return Ok(());
                    }
                    Ok(action) => {
                        if let Some(intent) = player.handle(action, &mut replica, now) {
                            client.send_message(DefaultChannel::ReliableOrdered, intent.to_json()?);
                        }
                    }
                    Err(_) => println!("unknown command, h for help"),
                }
            }
        }

        transport.send_packets(&mut client)?;
        thread::sleep(Duration::from_millis(50));
    }
}
