// src/services/qr_service.rs

use base64::{Engine, engine::general_purpose::STANDARD};
use image::Luma;
use qrcode::QrCode;
use serde_json::Value;

use crate::common::error::DependencyError;

/// QR Code renderizado: PNG cru (para o PDF) e data URI (para e-mail/JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct QrImage {
    pub png: Vec<u8>,
    pub data_uri: String,
}

pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &Value) -> Result<QrImage, DependencyError>;
}

#[derive(Debug, Default, Clone)]
pub struct QrCodeEncoder;

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, payload: &Value) -> Result<QrImage, DependencyError> {
        let text = serde_json::to_string(payload)
            .map_err(|e| DependencyError::QrEncoding(e.to_string()))?;

        let code = QrCode::new(text.as_bytes())
            .map_err(|e| DependencyError::QrEncoding(e.to_string()))?;

        // Renderiza para imagem
        let buffer = code
            .render::<Luma<u8>>()
            .min_dimensions(200, 200)
            .build();

        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(buffer)
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .map_err(|e| DependencyError::QrEncoding(e.to_string()))?;

        let data_uri = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        Ok(QrImage { png, data_uri })
    }
}
