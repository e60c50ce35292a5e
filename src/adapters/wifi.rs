//! WiFi provisioning adapter.
//!
//! Implements [`WifiConfigPort`]. Credentials live in NVS under their own
//! namespace so a factory reset can erase them without touching pairings.
//!
//! ## Start-up
//!
//! - Credentials stored: station mode, join the network, report the first
//!   DHCP lease as `connected`.
//! - Nothing stored: access-point mode with a one-page form at `/`. Posting
//!   `ssid=…&password=…` stores the credentials and restarts into station
//!   mode.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi` driver plus an
//!   `EspHttpServer` for the credential form.
//! - **all other targets**: simulation; tests drive the DHCP event by hand.

use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::{
    ConnectivityError, ConnectivityListener, Ssid, StorageError, StoragePort, WifiConfigPort,
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    http::server::EspHttpServer,
    nvs::EspDefaultNvsPartition,
    wifi::EspWifi,
};

const WIFI_NAMESPACE: &str = "wifi_cfg";
const SSID_KEY: &str = "ssid";
const PASSWORD_KEY: &str = "pass";

pub type Password = heapless::String<64>;

// ───────────────────────────────────────────────────────────────
// Provisioning state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Idle,
    /// Serving the configuration access point.
    AccessPoint,
    /// Joining the stored network.
    Connecting,
    /// Lease obtained.
    Connected,
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(ConnectivityError::InvalidSsid);
    }
    if !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Credential form
// ───────────────────────────────────────────────────────────────

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode one `application/x-www-form-urlencoded` value into `out`.
fn url_decode<const N: usize>(
    raw: &[u8],
    out: &mut heapless::String<N>,
    err: ConnectivityError,
) -> Result<(), ConnectivityError> {
    let mut bytes = heapless::Vec::<u8, N>::new();
    let mut i = 0;
    while i < raw.len() {
        let b = match raw[i] {
            b'+' => b' ',
            b'%' => {
                let hi = raw.get(i + 1).copied().and_then(hex_value).ok_or(err)?;
                let lo = raw.get(i + 2).copied().and_then(hex_value).ok_or(err)?;
                i += 2;
                (hi << 4) | lo
            }
            b => b,
        };
        bytes.push(b).map_err(|_| err)?;
        i += 1;
    }
    let text = core::str::from_utf8(&bytes).map_err(|_| err)?;
    out.clear();
    out.push_str(text).map_err(|_| err)
}

/// Parse and validate the body posted by the configuration page.
///
/// Unknown fields are ignored; a missing `password` means an open network.
pub fn parse_credentials_form(body: &[u8]) -> Result<(Ssid, Password), ConnectivityError> {
    let mut ssid: Option<Ssid> = None;
    let mut password = Password::new();

    for pair in body.split(|&b| b == b'&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.iter().position(|&b| b == b'=') {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, &pair[pair.len()..]),
        };
        match key {
            b"ssid" => {
                let mut decoded = Ssid::new();
                url_decode(value, &mut decoded, ConnectivityError::InvalidSsid)?;
                ssid = Some(decoded);
            }
            b"password" => url_decode(value, &mut password, ConnectivityError::InvalidPassword)?,
            _ => {}
        }
    }

    let ssid = ssid.ok_or(ConnectivityError::InvalidSsid)?;
    validate_ssid(&ssid)?;
    validate_password(&password)?;
    Ok((ssid, password))
}

// ───────────────────────────────────────────────────────────────
// Credential storage
// ───────────────────────────────────────────────────────────────

fn store_credentials<S: StoragePort>(
    storage: &mut S,
    ssid: &str,
    password: &str,
) -> Result<(), ConnectivityError> {
    validate_ssid(ssid)?;
    validate_password(password)?;
    storage.write(WIFI_NAMESPACE, PASSWORD_KEY, password.as_bytes())?;
    // SSID last: its presence is what marks the device as configured.
    storage.write(WIFI_NAMESPACE, SSID_KEY, ssid.as_bytes())?;
    info!("WiFi: credentials stored (SSID='{}')", ssid);
    Ok(())
}

fn read_string<S: StoragePort, const N: usize>(storage: &S, key: &str) -> Option<heapless::String<N>> {
    let mut buf = [0u8; 64];
    let len = storage.read(WIFI_NAMESPACE, key, &mut buf).ok()?;
    let text = core::str::from_utf8(&buf[..len.min(N)]).ok()?;
    heapless::String::try_from(text).ok()
}

// ───────────────────────────────────────────────────────────────
// WiFi provisioner
// ───────────────────────────────────────────────────────────────

pub struct WifiProvisioner<S: StoragePort> {
    storage: S,
    state: WifiState,
    listener: Option<Arc<dyn ConnectivityListener>>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    sysloop: EspSystemEventLoop,
    #[cfg(target_os = "espidf")]
    subscriptions: Vec<EspSubscription<'static, System>>,
    #[cfg(target_os = "espidf")]
    http: Option<EspHttpServer<'static>>,
}

impl<S: StoragePort> WifiProvisioner<S> {
    #[cfg(not(target_os = "espidf"))]
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            state: WifiState::Idle,
            listener: None,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Validate and store credentials. Takes effect on the next start.
    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        store_credentials(&mut self.storage, ssid, password)
    }

    pub fn configured_password(&self) -> Option<Password> {
        read_string(&self.storage, PASSWORD_KEY)
    }

    /// Simulation: the station obtained a lease.
    #[cfg(not(target_os = "espidf"))]
    pub fn simulate_ip_acquired(&mut self) {
        if self.state != WifiState::Connecting && self.state != WifiState::Connected {
            warn!("WiFi(sim): lease without a configured network ignored");
            return;
        }
        self.state = WifiState::Connected;
        if let Some(listener) = &self.listener {
            listener.on_wifi_connected();
        }
    }
}

impl<S: StoragePort> WifiConfigPort for WifiProvisioner<S>
where
    Self: PlatformWifi,
{
    fn start(
        &mut self,
        ap_ssid: &str,
        ap_password: &str,
        listener: Arc<dyn ConnectivityListener>,
    ) -> Result<(), ConnectivityError> {
        self.listener = Some(listener);
        match self.configured_ssid() {
            Some(ssid) => {
                let password = self.configured_password().unwrap_or_default();
                info!("WiFi: joining '{}'", ssid);
                self.start_station(&ssid, &password)?;
                self.state = WifiState::Connecting;
            }
            None => {
                validate_ssid(ap_ssid)?;
                validate_password(ap_password)?;
                info!("WiFi: serving configuration AP '{}'", ap_ssid);
                self.start_access_point(ap_ssid, ap_password)?;
                self.state = WifiState::AccessPoint;
            }
        }
        Ok(())
    }

    fn configured_ssid(&self) -> Option<Ssid> {
        read_string(&self.storage, SSID_KEY).filter(|s: &Ssid| !s.is_empty())
    }

    fn reset(&mut self) -> Result<(), StorageError> {
        self.storage.delete(WIFI_NAMESPACE, SSID_KEY)?;
        self.storage.delete(WIFI_NAMESPACE, PASSWORD_KEY)?;
        self.platform_forget();
        info!("WiFi: credentials erased");
        Ok(())
    }
}

/// Radio bring-up, split from the port so the host build can simulate it.
pub trait PlatformWifi {
    fn start_station(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    /// Drop anything the radio driver cached about the network.
    fn platform_forget(&mut self);
}

#[cfg(not(target_os = "espidf"))]
impl<S: StoragePort> PlatformWifi for WifiProvisioner<S> {
    fn start_station(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        info!("WiFi(sim): STA connect to '{}'", ssid);
        Ok(())
    }

    fn start_access_point(&mut self, ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        info!("WiFi(sim): AP '{}' up", ssid);
        Ok(())
    }

    fn platform_forget(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF backend
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
const CONFIG_PAGE: &str = "<!DOCTYPE html><html><head><meta name=\"viewport\" \
content=\"width=device-width\"><title>Outlet WiFi</title></head><body>\
<form method=\"post\" action=\"/settings\">\
<p>Network <input name=\"ssid\" maxlength=\"32\"></p>\
<p>Password <input name=\"password\" type=\"password\" maxlength=\"64\"></p>\
<p><button type=\"submit\">Join</button></p></form></body></html>";

#[cfg(target_os = "espidf")]
fn driver_failed(e: esp_idf_svc::sys::EspError) -> ConnectivityError {
    warn!("WiFi: driver error ({})", e);
    ConnectivityError::DriverFailed
}

#[cfg(target_os = "espidf")]
impl<S: StoragePort + Clone + Send + 'static> WifiProvisioner<S> {
    pub fn new(
        storage: S,
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        hostname: &str,
    ) -> Result<Self, ConnectivityError> {
        let mut wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(driver_failed)?;
        if let Err(e) = wifi.sta_netif_mut().set_hostname(hostname) {
            warn!("WiFi: hostname not set ({})", e);
        }
        Ok(Self {
            storage,
            state: WifiState::Idle,
            listener: None,
            wifi,
            sysloop,
            subscriptions: Vec::new(),
            http: None,
        })
    }

    fn subscribe_station_events(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::netif::IpEvent;
        use esp_idf_svc::wifi::WifiEvent;

        let listener = self.listener.clone();
        let ip = self
            .sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if let IpEvent::DhcpIpAssigned(_) = event {
                    info!("WiFi: got IP");
                    if let Some(listener) = &listener {
                        listener.on_wifi_connected();
                    }
                }
            })
            .map_err(driver_failed)?;

        let link = self
            .sysloop
            .subscribe::<WifiEvent, _>(|event| {
                if matches!(event, WifiEvent::StaDisconnected(_)) {
                    warn!("WiFi: link lost, reconnecting");
                    // SAFETY: the driver is started for as long as the subscription lives.
                    if let Err(e) = esp_idf_svc::sys::esp!(unsafe { esp_idf_svc::sys::esp_wifi_connect() }) {
                        warn!("WiFi: reconnect request failed ({})", e);
                    }
                }
            })
            .map_err(driver_failed)?;

        self.subscriptions.push(ip);
        self.subscriptions.push(link);
        Ok(())
    }

    fn serve_config_page(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::server::Configuration;
        use esp_idf_svc::io::{Read, Write};

        let mut server = EspHttpServer::new(&Configuration::default()).map_err(driver_failed)?;

        server
            .fn_handler("/", Method::Get, |req| {
                req.into_ok_response()?.write_all(CONFIG_PAGE.as_bytes())
            })
            .map_err(driver_failed)?;

        let storage = self.storage.clone();
        server
            .fn_handler::<anyhow::Error, _>("/settings", Method::Post, move |mut req| {
                let mut body = [0u8; 256];
                let mut len = 0;
                while len < body.len() {
                    let n = req.read(&mut body[len..])?;
                    if n == 0 {
                        break;
                    }
                    len += n;
                }
                match parse_credentials_form(&body[..len]) {
                    Ok((ssid, password)) => {
                        let mut storage = storage.clone();
                        store_credentials(&mut storage, &ssid, &password)
                            .map_err(|e| anyhow::anyhow!("{}", e))?;
                        req.into_ok_response()?
                            .write_all(b"Saved. The outlet restarts and joins your network.")?;
                        std::thread::spawn(|| {
                            std::thread::sleep(std::time::Duration::from_millis(1000));
                            esp_idf_svc::hal::reset::restart();
                        });
                    }
                    Err(e) => {
                        warn!("WiFi: rejected credentials ({})", e);
                        req.into_status_response(400)?.write_all(e.to_string().as_bytes())?;
                    }
                }
                Ok(())
            })
            .map_err(driver_failed)?;

        self.http = Some(server);
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl<S: StoragePort + Clone + Send + 'static> PlatformWifi for WifiProvisioner<S> {
    fn start_station(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: password
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        self.subscribe_station_events()?;
        self.wifi.set_configuration(&config).map_err(driver_failed)?;
        self.wifi.start().map_err(driver_failed)?;
        self.wifi.connect().map_err(driver_failed)
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AccessPointConfiguration, AuthMethod, Configuration};

        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: password
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            channel: 1,
            max_connections: 4,
            ..Default::default()
        });
        self.wifi.set_configuration(&config).map_err(driver_failed)?;
        self.wifi.start().map_err(driver_failed)?;
        self.serve_config_page()
    }

    fn platform_forget(&mut self) {
        // SAFETY: plain driver call; restores driver-owned NVS settings.
        if let Err(e) = esp_idf_svc::sys::esp!(unsafe { esp_idf_svc::sys::esp_wifi_restore() }) {
            warn!("WiFi: driver settings not restored ({})", e);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
