//! Command vocabulary
//!
//! Keywords and variable names understood by the module. Fragments are
//! concatenated without separators, so each carries the spaces it needs.

// Variable access
pub const SET: &str = "set ";
pub const GET: &str = "get ";
pub const TRUE: &str = " 1";
pub const FALSE: &str = " 0";

// Link setup
pub const MACHINE_MODE: &str = "sy c f machine";
pub const STREAM_BUFFERED: &str = "sy c b";
pub const STREAM_AUTO_CLOSE: &str = "st a";
pub const SOFTAP_DNS_ENABLED: &str = "softap.dns_server.enabled ";
pub const WAKEUP_TIMEOUT: &str = "sy w t ";

// System
pub const VERSION: &str = "ver";
pub const REBOOT: &str = "reboot";
pub const SAVE: &str = "save";
pub const SLEEP: &str = "sleep";

// Files
pub const FILE_OPEN: &str = "fop ";
pub const FILE_CREATE: &str = "fcr -o ";
pub const FILE_LIST: &str = "ls";

// Clients and servers
pub const TCP_CLIENT: &str = "tcpc ";
pub const TCP_CLIENT_LOCAL: &str = "tcpc -l ";
pub const TLS_CLIENT: &str = "tlsc ";
pub const TLS_CLIENT_LOCAL: &str = "tlsc -l ";
pub const UDP_CLIENT: &str = "udpc ";
pub const TCP_SERVER: &str = "tcps ";
pub const UDP_SERVER: &str = "udps ";
pub const START: &str = " start";
pub const STOP: &str = " stop";

// Streams
pub const CLOSE_ALL: &str = "close all";
pub const CLOSE: &str = "close ";
pub const WRITE: &str = "write ";
pub const READ: &str = "read ";
pub const LIST: &str = "list";
pub const POLL: &str = "poll";

// Network interfaces
pub const NETWORK_UP: &str = "nup";
pub const NETWORK_DOWN: &str = "ndo";
pub const IFACE_WLAN: &str = " -i wlan ";
pub const IFACE_SOFTAP: &str = " -i softap ";

// Wi-Fi
pub const WLAN_SSID: &str = "wl s ";
pub const WLAN_PASS: &str = "wl p ";
pub const WLAN_STATUS: &str = "wl n s";
pub const WLAN_IP: &str = "wl n i";
pub const SOFTAP_IP: &str = "so s i";
pub const SOFTAP_SSID: &str = "so s ";
pub const SOFTAP_PASS: &str = "so p ";
pub const SOFTAP_INFO: &str = "so o";
pub const CLIENTS_KEY: &str = "clients";
pub const RSSI: &str = "rssi";
pub const SCAN: &str = "scan";

// HTTP
pub const HTTP_GET: &str = "hge ";
pub const HTTP_POST: &str = "hpo ";

// Web setup
pub const SETUP_WEB: &str = "setup web";
pub const SETUP_STATUS: &str = "setup status";
pub const SETUP_SSID: &str = "se w s ";
pub const SETUP_PASS: &str = "se w p ";

/// WLAN status reported once joined with an IP address
pub const WLAN_STATUS_UP: char = '2';

/// Stream poll status reported when the peer closed
pub const POLL_REMOTE_CLOSED: u8 = b'2';
