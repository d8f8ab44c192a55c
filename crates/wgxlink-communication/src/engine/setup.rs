//! Captive web setup
//!
//! The module hosts a soft AP with a setup portal. [`Engine::poll`] asks the
//! portal for its status; once the user has picked a network the engine
//! joins it, and falls back to the portal if joining does not succeed within
//! the network timeout.

use super::Engine;
use crate::clock::Clock;
use crate::protocol::{commands, Command};
use crate::transport::Transport;
use wgxlink_core::{
    CommState, ConnectionState, EngineEvent, LinkError, Result, SetupState,
};

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Reboot the module into web setup mode.
    ///
    /// `ssid` and `pass` name the setup soft AP; factory values are kept
    /// when not given.
    pub fn start_web_setup(&mut self, ssid: Option<&str>, pass: Option<&str>) -> Result<()> {
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        self.reboot_now()?;

        if let Some(ssid) = ssid {
            self.set(commands::SETUP_SSID, ssid)?;
        }
        if let Some(pass) = pass {
            self.set(commands::SETUP_PASS, pass)?;
        }
        self.save()?;

        self.execute(&Command::new(commands::SETUP_WEB))?;

        self.set_setup(SetupState::WebSetupActive);
        self.set_connection(ConnectionState::ConnectedSoftAp);
        tracing::info!("Web setup portal started");
        Ok(())
    }

    pub fn is_web_setup_active(&self) -> bool {
        self.link.setup == SetupState::WebSetupActive
    }

    pub fn is_web_setup_connecting(&self) -> bool {
        self.link.setup == SetupState::ConnectingAfterSetup
    }

    /// One step of the setup flow
    pub(crate) fn poll_setup(&mut self) {
        match self.link.setup {
            SetupState::Idle => {}
            SetupState::WebSetupActive => self.poll_portal(),
            SetupState::ConnectingAfterSetup => self.poll_setup_connect(),
        }
    }

    fn poll_portal(&mut self) {
        let status = match self.execute(&Command::new(commands::SETUP_STATUS)) {
            Ok(response) => response,
            Err(e) if e.is_busy() => return,
            Err(e) => {
                // module may have rebooted under us
                tracing::warn!("Setup status failed: {}", e);
                self.clock.wait_ms(50);
                if let Err(e) = self.init_comms() {
                    tracing::warn!("Re-initializing during setup failed: {}", e);
                }
                return;
            }
        };

        if status.payload.first() != Some(&b'0') {
            self.clock.wait_ms(self.config.setup_poll_pause_ms);
            return;
        }

        tracing::info!("Web setup finished, joining configured network");
        // connect refuses to run while setup is active
        self.link.setup = SetupState::Idle;

        match self.connect(None, None) {
            Ok(()) => {
                self.setup_started_at = self.clock.now_ms();
                self.set_setup(SetupState::ConnectingAfterSetup);
            }
            Err(e) => {
                tracing::warn!("Join after web setup failed: {}", e);
                self.restart_web_setup();
            }
        }
    }

    fn poll_setup_connect(&mut self) {
        // is_connected reports false while setup is active
        self.link.setup = SetupState::Idle;

        if self.is_connected() {
            tracing::info!("Joined network configured through web setup");
            self.events
                .publish(EngineEvent::SetupChanged(SetupState::Idle));
        } else if self.clock.elapsed_since(self.setup_started_at)
            >= self.config.network_timeout_ms
        {
            tracing::warn!(
                "Network not joined within {}ms, back to web setup",
                self.config.network_timeout_ms
            );
            self.restart_web_setup();
        } else {
            self.link.setup = SetupState::ConnectingAfterSetup;
        }
    }

    fn restart_web_setup(&mut self) {
        if let Err(e) = self.start_web_setup(None, None) {
            tracing::warn!("Restarting web setup failed: {}", e);
        }
    }
}
