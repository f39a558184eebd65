//! Scaffold a new site directory

use anyhow::Result;
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"# Crianzas Conscientes

# Site
title: Crianzas Conscientes
subtitle: Acompañamiento en crianza consciente y respetuosa
description: ''
author: Mailen
language: es
timezone: Europe/Madrid
url: http://localhost:4000

# Seed posts live in <content_dir>/posts
content_dir: content
# long = "5 de enero de 2025", anything else is a strftime format
date_format: long

server:
  ip: 127.0.0.1
  port: 4000

# Leave url empty to run from the seed posts with the local admin below.
# SUPABASE_URL and SUPABASE_ANON_KEY override these values.
supabase:
  url: ''
  anon_key: ''
  posts_table: posts
  leads_table: lead_records

admin:
  email: ''
  password: ''

# SENDGRID_API_KEY overrides api_key
email:
  api_key: ''
  from_email: hola@mailensteinbrenner.com
  from_name: Crianzas Conscientes
  owner_email: mailensteinbrenner@gmail.com
  owner_name: Mailen

guide:
  pdf_url: ''
  filename: Guia-Crianza-Consciente.pdf

analytics:
  enabled: false
  measurement_id: ''
"#;

const SAMPLE_POST: &str = r#"---
title: Bienvenida
excerpt: Un primer artículo para comprobar que el blog funciona.
date: {date}
category: Crianza Consciente
tags: [bienvenida]
featured: true
---

# Bienvenida

Este es el primer artículo del blog. Edita o borra este archivo en
content/posts y escribe el tuyo en **Markdown**.

*La crianza consciente empieza por mirarnos a nosotros mismos.*

- Los encabezados empiezan con almohadilla
- Las listas empiezan con guion
- Los enlaces usan [texto](https://example.com)
"#;

const STYLESHEET: &str = r#"body {
  font-family: system-ui, sans-serif;
  line-height: 1.6;
  margin: 0 auto;
  max-width: 60rem;
  padding: 0 1rem;
}
"#;

/// Create the config, a sample post and the static directory in `target_dir`.
/// Existing files are left alone.
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir.join("content/posts"))?;
    fs::create_dir_all(target_dir.join("static/css"))?;

    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let files = [
        (target_dir.join("_config.yml"), CONFIG.to_string()),
        (
            target_dir.join("content/posts/bienvenida.md"),
            SAMPLE_POST.replace("{date}", &date),
        ),
        (target_dir.join("static/css/site.css"), STYLESHEET.to_string()),
    ];

    for (path, content) in files {
        if path.exists() {
            tracing::info!("Keeping existing {:?}", path);
            continue;
        }
        fs::write(&path, content)?;
        tracing::debug!("Created {:?}", path);
    }

    Ok(())
}
