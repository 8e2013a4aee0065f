// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use retrato_app::{CatalogEntry, Hit, ImageInfo, ItemContext, Person, PropCard};
use std::thread;
use tiny_http::{Header, Response, Server};
use url::Url;

/// (qid, label, description) rows the stub lookup endpoint matches against.
const SUBJECTS: [(&str, &str, &str); 14] = [
    ("Q1505892", "militia", "armed citizen company"),
    ("Q144", "dog", "domesticated animal"),
    ("Q11404", "drum", "percussion instrument"),
    ("Q45922", "lance", "pole weapon"),
    ("Q38720", "windmill", "wind-powered mill"),
    ("Q192110", "self-portrait", "portrait of the artist"),
    ("Q180733", "lute", "plucked string instrument"),
    ("Q9388534", "skull", "symbol of mortality"),
    ("Q46526", "pearl", "gem from a mollusc"),
    ("Q131151", "turban", "wound headdress"),
    ("Q10884", "tree", "woody plant"),
    ("Q8502", "mountain", "landform above the terrain"),
    ("Q35509", "cave", "natural underground space"),
    ("Q12280", "bridge", "structure spanning an obstacle"),
];

const PAINTERS: [(&str, &str); 8] = [
    ("Q5598", "Rembrandt van Rijn"),
    ("Q41264", "Johannes Vermeer"),
    ("Q167654", "Frans Hals"),
    ("Q205863", "Jan Steen"),
    ("Q232259", "Judith Leyster"),
    ("Q221092", "Pieter de Hooch"),
    ("Q346808", "Gerard ter Borch"),
    ("Q310973", "Carel Fabritius"),
];

const ARTWORKS: [(&str, &str); 8] = [
    ("Q1231009", "The Night Watch"),
    ("Q2068492", "The Milkmaid"),
    ("Q185372", "Girl with a Pearl Earring"),
    ("Q972916", "The Goldfinch"),
    ("Q154469", "The Syndics"),
    ("Q2722598", "The Merry Family"),
    ("Q2098884", "The Jewish Bride"),
    ("Q17335796", "View of Delft"),
];

const PROPS: [(&str, &str); 5] = [
    ("P180", "depicts"),
    ("P170", "creator"),
    ("P276", "location"),
    ("P195", "collection"),
    ("P571", "inception"),
];

const DATES: [&str; 5] = ["1642", "c. 1665", "1654", "1630s", "17th century"];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Deterministic art-domain fixture generator. The same seed always yields
/// the same item context, so test assertions can be exact.
#[derive(Debug, Clone)]
pub struct ArtFaker {
    rng: DeterministicRng,
}

impl ArtFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(if seed == 0 { 1 } else { seed }),
        }
    }

    pub fn subject_hit(&mut self) -> Hit {
        let (qid, label, description) = SUBJECTS[self.rng.int_n(SUBJECTS.len())];
        let mut hit = Hit::new(qid, label);
        hit.description = Some(description.to_owned());
        hit.count = Some(self.rng.int_n(40) as i64);
        hit
    }

    pub fn person(&mut self) -> Person {
        let (qid, label) = PAINTERS[self.rng.int_n(PAINTERS.len())];
        Person {
            qid: qid.to_owned(),
            label: label.to_owned(),
            description: Some("painter".to_owned()),
        }
    }

    pub fn catalog_entry(&mut self) -> CatalogEntry {
        let (qid, label) = ARTWORKS[self.rng.int_n(ARTWORKS.len())];
        let (_, artist) = PAINTERS[self.rng.int_n(PAINTERS.len())];
        CatalogEntry {
            qid: qid.to_owned(),
            label: label.to_owned(),
            artist_name: Some(artist.to_owned()),
            date: Some(DATES[self.rng.int_n(DATES.len())].to_owned()),
        }
    }

    pub fn prop_card(&mut self, index: usize) -> PropCard {
        let (pid, label) = PROPS[index % PROPS.len()];
        PropCard {
            pid: pid.to_owned(),
            label: label.to_owned(),
            image_lookup: format!("/images/{pid}"),
            images: Default::default(),
        }
    }

    /// A full injected-data payload: one item under edit, a few existing
    /// depicts, related people, property cards, and catalog rows.
    pub fn item_context(&mut self) -> ItemContext {
        let (qid, label) = ARTWORKS[self.rng.int_n(ARTWORKS.len())];
        let existing = (0..2).map(|_| self.subject_hit()).collect();
        let people = (0..2).map(|_| self.person()).collect();
        let props = (0..3).map(|index| self.prop_card(index)).collect();

        let mut catalog = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        while catalog.len() < 3 {
            let entry = self.catalog_entry();
            if entry.qid != qid && seen.insert(entry.qid.clone()) {
                catalog.push(entry);
            }
        }

        ItemContext {
            qid: qid.to_owned(),
            label: label.to_owned(),
            existing_depicts: existing,
            people,
            other_props: props,
            catalog,
        }
    }
}

/// Hits the stub endpoint returns for `terms`: subjects whose label
/// contains the query, case-insensitively.
pub fn canned_hits(terms: &str) -> Vec<Hit> {
    let needle = terms.to_lowercase();
    SUBJECTS
        .iter()
        .filter(|(_, label, _)| label.to_lowercase().contains(&needle))
        .map(|(qid, label, description)| {
            let mut hit = Hit::new(*qid, *label);
            hit.description = Some((*description).to_owned());
            hit
        })
        .collect()
}

/// Image items the stub endpoint returns for one property id.
pub fn canned_images(pid: &str) -> Vec<ImageInfo> {
    (1..=2)
        .map(|index| {
            let mut info = ImageInfo::new(format!("File:{pid}_{index}.jpg"));
            info.url = Some(format!("https://images.example/{pid}/{index}.jpg"));
            info
        })
        .collect()
}

/// An in-process lookup service speaking the two endpoint shapes the app
/// consumes: `GET /lookup?terms=...` and `GET /images/{pid}`. The serving
/// thread runs for the life of the process.
#[derive(Debug)]
pub struct StubLookup {
    base_url: String,
}

impl StubLookup {
    pub fn spawn() -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|error| anyhow!("start stub lookup server: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());

        thread::spawn(move || {
            for request in server.incoming_requests() {
                let response = respond(request.url());
                let _ = request.respond(response);
            }
        });

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn respond(raw_url: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    match stub_body(raw_url) {
        Ok(Some(body)) => json_response(&body, 200),
        Ok(None) => json_response(r#"{"error":"not found"}"#, 404),
        Err(_) => json_response(r#"{"error":"bad request"}"#, 400),
    }
}

fn stub_body(raw_url: &str) -> Result<Option<String>> {
    // tiny_http hands over a path-relative URL; anchor it to parse.
    let url = Url::parse(&format!("http://stub.invalid{raw_url}")).context("parse request URL")?;

    if url.path() == "/lookup" {
        let terms = url
            .query_pairs()
            .find(|(key, _)| key == "terms")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        let body = serde_json::to_string(&serde_json::json!({ "hits": canned_hits(&terms) }))
            .context("encode hits")?;
        return Ok(Some(body));
    }

    if let Some(pid) = url.path().strip_prefix("/images/") {
        let body = serde_json::to_string(&serde_json::json!({ "items": canned_images(pid) }))
            .context("encode items")?;
        return Ok(Some(body));
    }

    Ok(None)
}

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}
