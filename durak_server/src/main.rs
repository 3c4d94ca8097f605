mod draw_pile;
mod game_lobby;
mod game_logic;

use std::{
    collections::HashMap,
    error::Error,
    net::{SocketAddr, UdpSocket},
    time::{Duration, Instant, SystemTime},
};

use durak_core::{
    config::EngineConfig,
    event::{EventEntry, Intent},
    user_name::Username,
};
use game_lobby::GameLobby;
use log::{info, warn};
use renet::{
    transport::{NetcodeServerTransport, ServerAuthentication, ServerConfig},
    ClientId, ConnectionConfig, DefaultChannel, RenetServer, ServerEvent,
};
use tokio::time;

/// Sends every entry to the connected members allowed to see it.
fn deliver(server: &mut RenetServer, clients: &HashMap<ClientId, Username>, entries: &[EventEntry]) {
    for entry in entries {
        let text = match entry.event.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot encode {:?}: {}", entry.event, e);
                continue;
            }
        };
        for (id, username) in clients {
            if entry.is_visible_to(username) {
                server.send_message(*id, DefaultChannel::ReliableOrdered, text.clone());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let port = args
        .get(1)
        .ok_or("Usage: durak_server SERVER_PORT [CONFIG_JSON]")?;
    let config = match args.get(2) {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let public_addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    let mut server = RenetServer::new(ConnectionConfig::default());
    let current_time = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
    let server_config = ServerConfig {
        current_time,
        max_clients: 64,
        protocol_id: 0,
        public_addresses: vec![public_addr],
        authentication: ServerAuthentication::Unsecure,
    };
    let socket = UdpSocket::bind(public_addr)?;
    let mut transport = NetcodeServerTransport::new(server_config, socket)?;
    info!("listening on {}", public_addr);

    let mut lobby = GameLobby::new(config);
    let mut clients: HashMap<ClientId, Username> = HashMap::new();
    let mut interval = time::interval(Duration::from_millis(50));
    let mut last_updated = Instant::now();

    loop {
        let now = Instant::now();
        let duration = now - last_updated;
        last_updated = now;

        server.update(duration);
        transport.update(duration, &mut server)?;

        while let Some(event) = server.get_event() {
            match event {
                ServerEvent::ClientConnected { client_id } => {
                    let Some(user_data) = transport.user_data(client_id) else {
                        continue;
                    };
                    let username = Username::from_user_data(&user_data);
                    info!("client {} connected as {}", client_id, username);
                    clients.insert(client_id, username.clone());
                    let entries = lobby.handle(&username, Intent::Join {}, now);
                    deliver(&mut server, &clients, &entries);
                }
                ServerEvent::ClientDisconnected { client_id, reason } => {
                    info!("client {} disconnected: {}", client_id, reason);
                    if let Some(username) = clients.remove(&client_id) {
                        let entries = lobby.handle(&username, Intent::Leave {}, now);
                        deliver(&mut server, &clients, &entries);
                    }
                }
            }
        }

        for client_id in server.clients_id() {
            while let Some(message) =
                server.receive_message(client_id, DefaultChannel::ReliableOrdered)
            {
                let Some(username) = clients.get(&client_id).cloned() else {
                    continue;
                };
                let intent = String::from_utf8(message.into())
                    .map_err(|e| e.to_string())
                    .and_then(|text| Intent::from_json(&text).map_err(|e| e.to_string()));
                match intent {
                    Ok(intent) => {
                        let entries = lobby.handle(&username, intent, Instant::now());
                        deliver(&mut server, &clients, &entries);
                    }
                    Err(e) => warn!("dropped message from {}: {}", username, e),
                }
            }
        }

        transport.send_packets(&mut server);
        interval.tick().await;
    }
}
