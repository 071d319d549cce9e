//! UI description derived from the sale state

use alloy::primitives::U256;
use serde::Serialize;

use crate::state::UiState;
use crate::types::TxKind;

/// What the user can trigger from the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    ConnectWallet,
    StartPresale,
    PresaleMint,
    PublicMint,
}

impl UserAction {
    pub fn tx_kind(&self) -> Option<TxKind> {
        match self {
            UserAction::ConnectWallet => None,
            UserAction::StartPresale => Some(TxKind::StartPresale),
            UserAction::PresaleMint => Some(TxKind::PresaleMint),
            UserAction::PublicMint => Some(TxKind::PublicMint),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: &'static str,
    /// `None` renders a disabled button
    pub action: Option<UserAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiView {
    pub state: UiState,
    pub message: Option<&'static str>,
    pub button: Option<Button>,
    pub supply: String,
}

pub fn supply_line(tokens_minted: U256, max_supply: u64) -> String {
    format!("{}/{} Minted", tokens_minted, max_supply)
}

pub fn render(state: UiState, tokens_minted: U256, max_supply: u64) -> UiView {
    let (message, button) = match state {
        UiState::Disconnected => (
            None,
            Some(Button {
                label: "Connect Wallet",
                action: Some(UserAction::ConnectWallet),
            }),
        ),
        UiState::Loading => (
            None,
            Some(Button {
                label: "Loading...",
                action: None,
            }),
        ),
        UiState::OwnerPresaleNotStarted => (
            None,
            Some(Button {
                label: "Start Presale",
                action: Some(UserAction::StartPresale),
            }),
        ),
        UiState::PresaleNotStarted => (Some("Presale hasn't started yet"), None),
        UiState::PresaleLive => (
            Some("Presale is live. You can mint if your address is on the allow-list"),
            Some(Button {
                label: "Presale Mint",
                action: Some(UserAction::PresaleMint),
            }),
        ),
        UiState::PublicSaleLive => (
            Some("Public sale has started"),
            Some(Button {
                label: "Public Mint",
                action: Some(UserAction::PublicMint),
            }),
        ),
    };

    UiView {
        state,
        message,
        button,
        supply: supply_line(tokens_minted, max_supply),
    }
}
