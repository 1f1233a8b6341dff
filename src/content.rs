//! Jokes, quotes and memes from public web APIs

use crate::log_internal;
use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContentKind {
    Joke,
    Quote,
    Meme,
}

impl ContentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContentKind::Joke => "joke",
            ContentKind::Quote => "quote",
            ContentKind::Meme => "meme",
        }
    }
}

#[derive(serde::Deserialize)]
struct JokeResponse {
    setup: String,
    punchline: String,
}

#[derive(serde::Deserialize)]
struct QuoteResponse {
    #[serde(rename = "q")]
    text: String,
    #[serde(rename = "a")]
    author: String,
}

#[derive(serde::Deserialize)]
struct MemeResponse {
    title: String,
    url: String,
    #[serde(rename = "postLink")]
    post_link: Option<String>,
    #[serde(default)]
    nsfw: bool,
}

/// What gets posted back to the channel.
#[derive(Debug, PartialEq)]
pub enum Content {
    Text(String),
    Image {
        title: String,
        image_url: String,
        link: Option<String>,
    },
}

pub async fn fetch(client: &reqwest::Client, kind: ContentKind, url: &str) -> Result<Content> {
    log_internal!("Fetching {} from {}... ", kind.name(), url);
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    log_internal!("Fetching {} from {}... done", kind.name(), url);

    parse(kind, &body)
}

fn decode<T: DeserializeOwned>(kind: ContentKind, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| anyhow!("Malformed {} response: {}", kind.name(), e))
}

pub fn parse(kind: ContentKind, body: &str) -> Result<Content> {
    match kind {
        ContentKind::Joke => {
            let joke: JokeResponse = decode(kind, body)?;
            Ok(Content::Text(format!("{}\n||{}||", joke.setup, joke.punchline)))
        }
        ContentKind::Quote => {
            // The quote API answers with a one-element list.
            let quotes: Vec<QuoteResponse> = decode(kind, body)?;
            let quote = quotes
                .into_iter()
                .next()
                .ok_or(anyhow!("Empty quote response"))?;
            Ok(Content::Text(format!("> {}\n— {}", quote.text, quote.author)))
        }
        ContentKind::Meme => {
            let meme: MemeResponse = decode(kind, body)?;
            if meme.nsfw {
                return Err(anyhow!("Refusing NSFW meme"));
            }
            Ok(Content::Image {
                title: meme.title,
                image_url: meme.url,
                link: meme.post_link,
            })
        }
    }
}
