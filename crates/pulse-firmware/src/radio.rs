//! ESP-NOW broadcast over the Wi-Fi radio
//!
//! The radio is powered for a single report per wake: bring-up starts the
//! Wi-Fi controller in station mode, registers the broadcast peer, and
//! tear-down stops the controller again. One frame, no acknowledgement.

use esp_hal::peripherals::WIFI;
use esp_radio::Controller;
use esp_radio::esp_now::{EspNow, EspNowWifiInterface, PeerInfo};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::{debug, warn};
use pulse_core::RadioError;
use pulse_core::report::BroadcastRadio;
use static_cell::StaticCell;

/// Largest ESP-NOW payload.
const ESP_NOW_MAX_PAYLOAD: usize = 250;

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();

pub struct EspNowRadio {
    wifi: Option<WIFI<'static>>,
}

pub struct EspNowLink {
    controller: WifiController<'static>,
    esp_now: EspNow<'static>,
}

impl EspNowRadio {
    pub fn new(wifi: WIFI<'static>) -> Self {
        Self { wifi: Some(wifi) }
    }
}

impl BroadcastRadio for EspNowRadio {
    type Link = EspNowLink;

    async fn bring_up(&mut self, channel: u8) -> Result<EspNowLink, RadioError> {
        // The peripheral can only be handed over once per boot.
        let wifi = self.wifi.take().ok_or(RadioError::BringUp(channel))?;

        let radio = esp_radio::init().map_err(|e| {
            warn!("radio init failed: {:?}", e);
            RadioError::BringUp(channel)
        })?;
        let radio = &*RADIO.init(radio);

        let (mut controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
            .map_err(|e| {
                warn!("wifi init failed: {:?}", e);
                RadioError::BringUp(channel)
            })?;

        controller
            .set_config(&ModeConfig::Client(ClientConfig::default()))
            .map_err(|e| {
                warn!("wifi mode not set: {:?}", e);
                RadioError::BringUp(channel)
            })?;
        controller.start_async().await.map_err(|e| {
            warn!("wifi start failed: {:?}", e);
            RadioError::BringUp(channel)
        })?;

        let mut esp_now = interfaces.esp_now;
        esp_now.set_channel(channel).map_err(|e| {
            warn!("esp-now channel {} rejected: {:?}", channel, e);
            RadioError::BringUp(channel)
        })?;

        debug!("esp-now up on channel {}", channel);
        Ok(EspNowLink {
            controller,
            esp_now,
        })
    }

    async fn send(
        &mut self,
        link: &mut EspNowLink,
        destination: &[u8; 6],
        payload: &[u8],
    ) -> Result<(), RadioError> {
        if payload.len() > ESP_NOW_MAX_PAYLOAD {
            return Err(RadioError::PayloadTooLarge(payload.len()));
        }

        if !link.esp_now.peer_exists(destination) {
            link.esp_now
                .add_peer(PeerInfo {
                    interface: EspNowWifiInterface::Sta,
                    peer_address: *destination,
                    lmk: None,
                    channel: None,
                    encrypt: false,
                })
                .map_err(|e| {
                    warn!("esp-now peer not added: {:?}", e);
                    RadioError::Send
                })?;
        }

        link.esp_now
            .send_async(destination, payload)
            .await
            .map_err(|e| {
                warn!("esp-now send failed: {:?}", e);
                RadioError::Send
            })
    }

    async fn tear_down(&mut self, mut link: EspNowLink) -> Result<(), RadioError> {
        link.controller.stop_async().await.map_err(|e| {
            warn!("wifi stop failed: {:?}", e);
            RadioError::TearDown
        })
    }
}
