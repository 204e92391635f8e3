//! Printable member cards: a QR code carrying the member id, which is the
//! payload the scanner resolves back to the member.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};

use crate::db::models::MemberIdentity;

const CARD_MIN_SIZE: u32 = 240;

pub fn render_member_card(member: &MemberIdentity) -> Result<GrayImage> {
    let code = QrCode::with_error_correction_level(member.id.as_bytes(), EcLevel::M)
        .map_err(|err| anyhow!("member id {:?} does not fit in a QR code: {err}", member.id))?;

    Ok(code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(CARD_MIN_SIZE, CARD_MIN_SIZE)
        .build())
}

/// Render the card and write it to `path`; the format follows the extension.
pub fn save_member_card(member: &MemberIdentity, path: &Path) -> Result<()> {
    let card = render_member_card(member)?;
    card.save(path)
        .with_context(|| format!("failed to write member card to {}", path.display()))
}
