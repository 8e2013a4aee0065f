// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use retrato_app::{BoxId, Hit, ImageInfo, RequestId};
use retrato_lookup::Client;
use retrato_tui::{InternalEvent, LookupRuntime};
use std::sync::mpsc::Sender;
use std::thread;

/// Runtime backed by the real lookup service. Lookups run on worker
/// threads so typing stays responsive; responses flow back over the
/// internal-event channel and may arrive in any order -- the per-box
/// request id decides which ones still matter.
pub struct HttpRuntime {
    client: Client,
}

impl HttpRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl LookupRuntime for HttpRuntime {
    fn search(&mut self, terms: &str) -> Result<Vec<Hit>> {
        self.client.search(terms)
    }

    fn item_images(&mut self, lookup_url: &str) -> Result<Vec<ImageInfo>> {
        self.client.item_images(lookup_url)
    }

    fn spawn_search(
        &mut self,
        box_id: BoxId,
        request: RequestId,
        terms: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let terms = terms.to_owned();
        thread::spawn(move || {
            let outcome = client.search(&terms).map_err(|error| error.to_string());
            let _ = tx.send(InternalEvent::Lookup {
                box_id,
                request,
                outcome,
            });
        });
        Ok(())
    }

    fn spawn_item_images(
        &mut self,
        index: usize,
        lookup_url: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let client = self.client.clone();
        let lookup_url = lookup_url.to_owned();
        thread::spawn(move || {
            let outcome = client
                .item_images(&lookup_url)
                .map_err(|error| error.to_string());
            let _ = tx.send(InternalEvent::PropImages { index, outcome });
        });
        Ok(())
    }
}
