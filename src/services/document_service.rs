// src/services/document_service.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genpdf::{Element, elements, style};

use crate::common::error::DependencyError;

/// Dados impressos no crachá do visitante.
#[derive(Debug, Clone)]
pub struct PassDocument {
    pub pass_number: String,
    pub visitor_name: String,
    pub visitor_email: String,
    pub visitor_phone: String,
    pub host_name: Option<String>,
    pub host_department: Option<String>,
    pub purpose: Option<String>,
    pub location: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub access_areas: Vec<String>,
    pub special_instructions: String,
    /// Caminho servível (`/uploads/...`) da foto, quando houver.
    pub photo: Option<String>,
    pub qr_png: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Caminho servível gravado no passe.
    pub path: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_pass(&self, document: PassDocument) -> Result<RenderedDocument, DependencyError>;
}

/// Gera o crachá em PDF com genpdf e grava em `<uploads>/passes/<numero>.pdf`.
#[derive(Debug, Clone)]
pub struct PdfPassRenderer {
    fonts_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl PdfPassRenderer {
    pub fn new(fonts_dir: impl Into<PathBuf>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            uploads_dir: uploads_dir.into(),
        }
    }
}

#[async_trait]
impl DocumentRenderer for PdfPassRenderer {
    async fn render_pass(&self, document: PassDocument) -> Result<RenderedDocument, DependencyError> {
        let file_name = format!("{}.pdf", document.pass_number);
        let photo_file = document
            .photo
            .as_deref()
            .and_then(|p| local_upload_path(&self.uploads_dir, p));
        let fonts_dir = self.fonts_dir.clone();

        // genpdf é síncrono e pesado: fora do executor
        let bytes = tokio::task::spawn_blocking(move || build_pdf(&fonts_dir, &document, photo_file))
            .await
            .map_err(|e| DependencyError::Rendering(e.to_string()))??;

        let dir = self.uploads_dir.join("passes");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DependencyError::Rendering(e.to_string()))?;
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .map_err(|e| DependencyError::Rendering(e.to_string()))?;

        Ok(RenderedDocument {
            path: format!("/uploads/passes/{file_name}"),
            bytes,
        })
    }
}

/// Converte `/uploads/x/y.jpg` no arquivo local correspondente.
/// URLs externas e caminhos com `..` não são lidos.
fn local_upload_path(uploads_dir: &Path, servable: &str) -> Option<PathBuf> {
    let relative = Path::new(servable.strip_prefix("/uploads/")?);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(uploads_dir.join(relative))
}

fn render_err(e: impl std::fmt::Display) -> DependencyError {
    DependencyError::Rendering(e.to_string())
}

fn build_pdf(
    fonts_dir: &Path,
    document: &PassDocument,
    photo_file: Option<PathBuf>,
) -> Result<Vec<u8>, DependencyError> {
    // 1. Configura o PDF
    // Carrega a fonte da pasta configurada
    let font_family = genpdf::fonts::from_files(fonts_dir, "Roboto", None)
        .map_err(|e| DependencyError::Rendering(format!("fonte não encontrada em {}: {e}", fonts_dir.display())))?;

    let mut doc = genpdf::Document::new(font_family);
    doc.set_title(format!("Passe {}", document.pass_number));
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(10);
    doc.set_page_decorator(decorator);

    // --- CABEÇALHO ---
    doc.push(
        elements::Paragraph::new("PASSE DE VISITANTE")
            .styled(style::Style::new().bold().with_font_size(18)),
    );
    doc.push(
        elements::Paragraph::new(format!("Nº {}", document.pass_number))
            .styled(style::Style::new().bold().with_font_size(14)),
    );
    doc.push(elements::Break::new(1.5));

    // --- FOTO ---
    // Foto ilegível não impede o crachá
    if let Some(path) = photo_file {
        match elements::Image::from_path(&path) {
            Ok(image) => {
                doc.push(image.with_scale(genpdf::Scale::new(0.4, 0.4)));
                doc.push(elements::Break::new(1));
            }
            Err(e) => tracing::warn!("Foto {} ignorada no PDF: {}", path.display(), e),
        }
    }

    // --- DADOS ---
    let mut table = elements::TableLayout::new(vec![1, 3]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));
    let style_bold = style::Style::new().bold();

    let mut rows: Vec<(&str, String)> = vec![
        ("Visitante", document.visitor_name.clone()),
        ("E-mail", document.visitor_email.clone()),
        ("Telefone", document.visitor_phone.clone()),
        ("Válido de", document.valid_from.format("%d/%m/%Y %H:%M").to_string()),
        ("Válido até", document.valid_until.format("%d/%m/%Y %H:%M").to_string()),
    ];
    if let Some(host) = &document.host_name {
        let department = document
            .host_department
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        rows.push(("Anfitrião", format!("{host}{department}")));
    }
    if let Some(purpose) = &document.purpose {
        rows.push(("Motivo", purpose.clone()));
    }
    if let Some(location) = &document.location {
        rows.push(("Local", location.clone()));
    }
    if !document.access_areas.is_empty() {
        rows.push(("Áreas", document.access_areas.join(", ")));
    }

    for (label, value) in rows {
        table
            .row()
            .element(elements::Paragraph::new(label).styled(style_bold))
            .element(elements::Paragraph::new(value))
            .push()
            .map_err(render_err)?;
    }
    doc.push(table);

    if !document.special_instructions.trim().is_empty() {
        doc.push(elements::Break::new(1));
        doc.push(
            elements::Paragraph::new(document.special_instructions.clone())
                .styled(style::Style::new().italic().with_font_size(10)),
        );
    }

    // --- QR CODE ---
    if let Some(png) = &document.qr_png {
        let qr = image::load_from_memory(png).map_err(render_err)?;
        let pdf_image = elements::Image::from_dynamic_image(qr)
            .map_err(render_err)?
            .with_alignment(genpdf::Alignment::Center)
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(elements::Break::new(2));
        doc.push(pdf_image);
    }

    // 2. Renderiza para Buffer (Memória)
    let mut buffer = Vec::new();
    doc.render(&mut buffer).map_err(render_err)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_plain_upload_paths_map_to_files() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            local_upload_path(root, "/uploads/visitors/a.jpg"),
            Some(PathBuf::from("/srv/uploads/visitors/a.jpg"))
        );
        assert_eq!(local_upload_path(root, "/uploads/../etc/passwd"), None);
        assert_eq!(local_upload_path(root, "https://cdn.example.com/a.jpg"), None);
    }

    #[tokio::test]
    async fn missing_fonts_is_a_rendering_error() {
        let tmp = std::env::temp_dir().join(format!("vp-docs-{}", uuid::Uuid::new_v4()));
        let renderer = PdfPassRenderer::new(tmp.join("no-fonts"), tmp.join("uploads"));
        let now = Utc::now();
        let err = renderer
            .render_pass(PassDocument {
                pass_number: "VP3001010001".into(),
                visitor_name: "Carlos".into(),
                visitor_email: "c@x.com".into(),
                visitor_phone: "1".into(),
                host_name: None,
                host_department: None,
                purpose: None,
                location: None,
                valid_from: now,
                valid_until: now + chrono::Duration::hours(1),
                access_areas: vec![],
                special_instructions: String::new(),
                photo: None,
                qr_png: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Rendering(_)));
    }
}
