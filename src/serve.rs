// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Preview Server
//!
//! A small `tiny_http` server over the output tree for local preview.
//!
//! Request resolution is a pure function, [`classify`]:
//!
//! 1. Exact file match → serve the file
//! 2. Directory with `index.html` → serve the index
//! 3. Anything else, including `..` traversal → not found
//!
//! Not-found requests are answered with status 404 and the bytes of the
//! generated `404.html`, read once when the server starts. The page is not
//! reloaded afterwards, so a rebuild while serving keeps the old body.

use crate::core::error::{BlogError, Result};
use log::{info, warn};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// File served for unmatched requests, relative to the output directory.
pub const NOT_FOUND_FILE: &str = "404.html";

/// Content type of the not-found response.
pub const NOT_FOUND_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// The cached body of `404.html`.
#[derive(Debug, Clone)]
pub struct NotFoundPage {
    bytes: Arc<[u8]>,
}

impl NotFoundPage {
    /// Reads `404.html` from `output_dir`.
    pub fn load(output_dir: &Path) -> Result<Self> {
        let path = output_dir.join(NOT_FOUND_FILE);
        let bytes =
            fs::read(&path).map_err(|e| BlogError::io_error(path, e))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Wraps already loaded bytes.
    pub fn from_bytes<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The cached page body.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Where a request URL resolves in the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// An existing file to serve.
    File(PathBuf),
    /// No file matches; answer with the 404 page.
    NotFound,
}

/// Resolves a request URL against `output_dir`.
///
/// The query string and fragment are ignored and the path is
/// percent-decoded. Any `..` segment resolves to [`Route::NotFound`].
pub fn classify(url: &str, output_dir: &Path) -> Route {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => return Route::NotFound,
    };

    let mut local = output_dir.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Route::NotFound,
            s if s.contains('\\') => return Route::NotFound,
            s => local.push(s),
        }
    }

    if local.is_file() {
        return Route::File(local);
    }
    if local.is_dir() {
        let index = local.join("index.html");
        if index.is_file() {
            return Route::File(index);
        }
    }
    Route::NotFound
}

/// Guesses a MIME content type from the file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// A response ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header value.
    pub content_type: &'static str,
    /// Response body.
    pub body: Arc<[u8]>,
}

/// Preview server for a built output tree.
#[derive(Debug, Clone)]
pub struct DevServer {
    output_dir: PathBuf,
    not_found: NotFoundPage,
    port: u16,
}

impl DevServer {
    /// Creates a server for `output_dir`, loading its `404.html`.
    pub fn new(output_dir: &Path, port: u16) -> Result<Self> {
        Ok(Self::with_not_found(
            output_dir,
            port,
            NotFoundPage::load(output_dir)?,
        ))
    }

    /// Creates a server with an already loaded 404 page.
    pub fn with_not_found(
        output_dir: &Path,
        port: u16,
        not_found: NotFoundPage,
    ) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            not_found,
            port,
        }
    }

    /// Address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    /// Computes the response for a request URL.
    pub fn reply(&self, url: &str) -> Result<Reply> {
        match classify(url, &self.output_dir) {
            Route::File(path) => {
                let body = fs::read(&path)
                    .map_err(|e| BlogError::io_error(path.clone(), e))?;
                Ok(Reply {
                    status: 200,
                    content_type: guess_content_type(&path),
                    body: body.into(),
                })
            }
            Route::NotFound => Ok(Reply {
                status: 404,
                content_type: NOT_FOUND_CONTENT_TYPE,
                body: Arc::clone(&self.not_found.bytes),
            }),
        }
    }

    /// Serves requests until the process is stopped.
    pub fn run(&self) -> Result<()> {
        let addr = self.addr();
        let server = Server::http(addr).map_err(|e| {
            BlogError::serve_error(format!("Failed to bind {}: {}", addr, e))
        })?;
        info!("Serving {} at http://{}", self.output_dir.display(), addr);

        for request in server.incoming_requests() {
            if let Err(e) = self.handle(request) {
                warn!("Request failed: {}", e);
            }
        }
        Ok(())
    }

    fn handle(&self, request: Request) -> Result<()> {
        let url = request.url().to_string();
        let reply = match self.reply(&url) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to serve {}: {}", url, e);
                Reply {
                    status: 500,
                    content_type: "text/plain; charset=utf-8",
                    body: Arc::from(&b"500 Internal Server Error"[..]),
                }
            }
        };

        let header = Header::from_bytes("Content-Type", reply.content_type)
            .map_err(|()| {
                BlogError::serve_error("Invalid Content-Type header")
            })?;
        let response = Response::from_data(reply.body.to_vec())
            .with_status_code(StatusCode(reply.status))
            .with_header(header);

        request.respond(response).map_err(|e| {
            BlogError::serve_error(format!("Failed to respond to {}: {}", url, e))
        })
    }
}
