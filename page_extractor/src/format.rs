use chrono::{DateTime, TimeZone};
use std::fmt::{Display, Write};

use crate::{Mode, PageMetadata};

const BANNER: &str = "=== EXTRAÇÃO AVANÇADA DE TEXTO ===";

/// Header and body of a saved artifact.
pub fn format_artifact<Tz>(
    url: &str,
    meta: &PageMetadata,
    body: &str,
    mode: Mode,
    at: DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::with_capacity(body.len() + 512);
    let _ = writeln!(out, "{BANNER}");
    let _ = writeln!(out, "TÍTULO: {}", meta.title);
    let _ = writeln!(out, "URL: {url}");
    let _ = writeln!(out, "DATA: {}", at.format("%d/%m/%Y %H:%M:%S"));
    let _ = writeln!(out, "MÉTODO: {}", mode.label());

    let optional = [
        ("DESCRIÇÃO", &meta.description),
        ("AUTOR", &meta.author),
        ("PALAVRAS-CHAVE", &meta.keywords),
    ];
    for (label, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            let _ = writeln!(out, "{label}: {value}");
        }
    }

    out.push_str(&"=".repeat(60));
    out.push_str("\n\n");
    out.push_str(body);
    out
}
