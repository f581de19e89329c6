//! formrag - knowledge-card context assembly CLI
//!
//! The `formrag` command loads a knowledge-card directory and prints the
//! prompt chunks a vision-language model should see before a form page.
//!
//! ## Commands
//!
//! - `chunks`: Assemble prompt chunks for a section or explicit fields
//! - `search`: Find fields whose synonyms match the given cues
//! - `sections`: List sections or the fields of one section
//! - `report`: Show what was loaded and what was skipped
//! - `candidates`: Extract candidate tokens from a page image
//! - `prompt`: Run the full pipeline for one page image

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use formrag_candidates::{CandidateExtractor, ModelRunner, StubRunner};
use formrag_core::{
    fields_for_section, render_prompt, section_ids, ContextAssembler, ContextRequest,
    KnowledgeStore, LoadReport, PromptChunk, RagConfig,
};
use tracing::{info, Level};

const DEFAULT_INSTRUCTION: &str =
    "Using the context above, extract the requested fields from the attached form page as JSON.";

#[derive(Parser)]
#[command(name = "formrag")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Knowledge-card context assembly for clinical form extraction", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Knowledge-card base directory
    #[arg(long, global = true, env = "FORMRAG_CARDS_DIR")]
    cards_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble prompt chunks for a section or a list of fields
    Chunks {
        #[command(flatten)]
        selection: Selection,

        /// Page tokens used to filter the medication lexicon (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tokens: Vec<String>,

        /// Characters of each chunk to print
        #[arg(long, default_value = "240")]
        preview: usize,

        /// Print every chunk in full, one per line
        #[arg(long, conflicts_with = "preview")]
        full: bool,
    },

    /// Find fields whose synonyms match the given cues
    Search {
        /// Cue phrases, matched case-insensitively
        #[arg(required = true)]
        cues: Vec<String>,
    },

    /// List known sections, or the fields of one section
    Sections {
        /// Section to expand
        section: Option<String>,
    },

    /// Load the card directory and print the load report
    Report {
        /// Print the full report as JSON
        #[arg(long)]
        raw: bool,
    },

    /// Extract candidate tokens from a page image
    Candidates {
        /// Page image path
        image: PathBuf,
    },

    /// Candidates, context, chunks and model output for one page image
    Prompt {
        /// Page image path
        image: PathBuf,

        #[command(flatten)]
        selection: Selection,

        /// Instruction appended after the context chunks
        #[arg(long)]
        instruction: Option<String>,
    },
}

/// Which fields to assemble context for, and how.
#[derive(clap::Args, Debug, Clone, Default)]
struct Selection {
    /// Section whose fields are targeted
    #[arg(short, long)]
    section: Option<String>,

    /// Additional target fields (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    fields: Vec<String>,

    /// Medication lexicon card key
    #[arg(long, env = "FORMRAG_MEDS_LEXICON")]
    lexicon: Option<String>,

    /// Maximum lexicon entries when no page token matches
    #[arg(long, env = "FORMRAG_MEDS_TOP_K")]
    top_k: Option<usize>,

    /// Leave policy cards out
    #[arg(long)]
    no_policies: bool,

    /// Leave the abbreviation table out
    #[arg(long)]
    no_abbr: bool,

    /// Leave range cards out
    #[arg(long)]
    no_ranges: bool,
}

impl Selection {
    /// Section fields followed by explicit fields, without repeats.
    fn target_fields(&self) -> Vec<String> {
        let section = self
            .section
            .as_deref()
            .map(fields_for_section)
            .unwrap_or_default();

        let mut out: Vec<String> = Vec::new();
        let names = section
            .iter()
            .map(|name| name.to_string())
            .chain(self.fields.iter().cloned());
        for name in names {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    fn apply(&self, config: RagConfig) -> RagConfig {
        let mut config = config;
        if let Some(key) = &self.lexicon {
            config = config.with_meds_lexicon(key.clone());
        }
        if let Some(top_k) = self.top_k {
            config = config.with_meds_top_k(top_k);
        }
        config
            .with_policies(!self.no_policies)
            .with_abbreviations(!self.no_abbr)
            .with_ranges(!self.no_ranges)
    }

    fn request(&self, config: &RagConfig, page_tokens: &[String]) -> Result<ContextRequest> {
        if let Some(section) = &self.section {
            if fields_for_section(section).is_empty() {
                info!(event = "cli.unknown_section", section = %section);
            }
        }
        let fields = self.target_fields();
        if self.section.is_none() && fields.is_empty() {
            bail!("Pass --section or --fields to choose target fields");
        }
        Ok(ContextRequest::new(fields)
            .with_config(&self.apply(config.clone()))
            .with_page_tokens(page_tokens.iter().cloned()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    formrag_core::init_tracing(cli.json, level);

    let config = resolve_config(cli.cards_dir.as_deref())?;

    match cli.command {
        Commands::Chunks {
            selection,
            tokens,
            preview,
            full,
        } => cmd_chunks(&config, &selection, &tokens, if full { None } else { Some(preview) }),
        Commands::Search { cues } => cmd_search(&config, &cues),
        Commands::Sections { section } => cmd_sections(section.as_deref()),
        Commands::Report { raw } => cmd_report(&config, raw),
        Commands::Candidates { image } => cmd_candidates(&image),
        Commands::Prompt {
            image,
            selection,
            instruction,
        } => cmd_prompt(
            &config,
            &StubRunner,
            &image,
            &selection,
            instruction.as_deref().unwrap_or(DEFAULT_INSTRUCTION),
        ),
    }
}

/// Environment defaults, with `--cards-dir` taking precedence.
fn resolve_config(cards_dir: Option<&Path>) -> Result<RagConfig> {
    let mut config = RagConfig::from_env().context("Invalid formrag environment configuration")?;
    if let Some(dir) = cards_dir {
        config.cards_dir = dir.to_path_buf();
    }
    Ok(config)
}

fn open_store(config: &RagConfig) -> Result<(KnowledgeStore, LoadReport)> {
    let mut store = KnowledgeStore::new(config.paths());
    let report = store.load().with_context(|| {
        format!(
            "Failed to load knowledge cards from {}",
            config.cards_dir.display()
        )
    })?;
    Ok((store, report))
}

fn assemble(store: &KnowledgeStore, request: &ContextRequest) -> Result<Vec<PromptChunk>> {
    let assembler = ContextAssembler::new(store);
    let payload = assembler.build_context(request);
    assembler
        .to_prompt_chunks(&payload)
        .context("Failed to serialize prompt chunks")
}

fn cmd_chunks(
    config: &RagConfig,
    selection: &Selection,
    tokens: &[String],
    preview: Option<usize>,
) -> Result<()> {
    let (store, _) = open_store(config)?;
    let request = selection.request(config, tokens)?;
    let chunks = assemble(&store, &request)?;

    match preview {
        None => {
            for chunk in &chunks {
                println!("{}", chunk);
            }
        }
        Some(max_chars) => {
            println!("=== Prompt chunks (send before the image) ===");
            for line in render_chunk_previews(&chunks, max_chars) {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn render_chunk_previews(chunks: &[PromptChunk], max_chars: usize) -> Vec<String> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let text = chunk.preview(max_chars);
            let ellipsis = if text.len() < chunk.text.len() { "..." } else { "" };
            format!(
                "[Chunk {}] ({}, ~{} tokens) {}{}",
                i + 1,
                chunk.kind,
                chunk.estimated_tokens,
                text,
                ellipsis
            )
        })
        .collect()
}

fn cmd_search(config: &RagConfig, cues: &[String]) -> Result<()> {
    let (store, _) = open_store(config)?;
    let matches = store.search_fields_by_synonyms(cues);

    if matches.is_empty() {
        println!("No fields match {:?}", cues);
        return Ok(());
    }
    for name in matches {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_sections(section: Option<&str>) -> Result<()> {
    match section {
        None => {
            for id in section_ids() {
                println!("{:<16} {} fields", id, fields_for_section(id).len());
            }
        }
        Some(id) => {
            let fields = fields_for_section(id);
            if fields.is_empty() {
                println!("Unknown section: {}", id);
                println!("Known sections: {}", section_ids().collect::<Vec<_>>().join(", "));
                return Ok(());
            }
            for field in fields {
                println!("{}", field);
            }
        }
    }
    Ok(())
}

fn cmd_report(config: &RagConfig, raw: bool) -> Result<()> {
    let (store, report) = open_store(config)?;

    if raw {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Knowledge cards: {}", report.base_dir.display());
    println!("Loaded at:       {}", report.loaded_at.to_rfc3339());
    println!("Field cards:     {}", store.field_count());
    println!("Synonyms:        {}", store.synonym_count());
    println!("Policies:        {}", store.policies().len());
    println!("Abbreviations:   {}", store.abbreviations().len());
    println!("Ranges:          {}", store.ranges().len());
    println!("Lexicons:        {}", store.lexicons().len());

    let skipped = report.skipped();
    if skipped.is_empty() {
        println!("\nNo records skipped.");
    } else {
        println!("\nSkipped {} record(s):", skipped.len());
        for diag in skipped {
            println!("  - [{}] {}: {}", diag.kind, diag.source, diag.status);
        }
    }
    Ok(())
}

fn cmd_candidates(image: &Path) -> Result<()> {
    let tokens = CandidateExtractor::stub()
        .extract_from_file(image)
        .with_context(|| format!("Candidate extraction failed for {}", image.display()))?;

    for token in tokens {
        println!("{}", token);
    }
    Ok(())
}

fn cmd_prompt<R: ModelRunner + Clone>(
    config: &RagConfig,
    runner: &R,
    image: &Path,
    selection: &Selection,
    instruction: &str,
) -> Result<()> {
    let (prompt, output) = run_pipeline(config, runner, image, selection, instruction)?;

    println!("=== Prompt ===");
    println!("{}", prompt);
    println!("\n=== Model output ===");
    println!("{}", output);
    Ok(())
}

/// Candidates, then context, then the rendered prompt sent back to the runner.
fn run_pipeline<R: ModelRunner + Clone>(
    config: &RagConfig,
    runner: &R,
    image: &Path,
    selection: &Selection,
    instruction: &str,
) -> Result<(String, String)> {
    let page_tokens = CandidateExtractor::new(runner.clone())
        .extract_from_file(image)
        .with_context(|| format!("Candidate extraction failed for {}", image.display()))?;

    let (store, _) = open_store(config)?;
    let request = selection.request(config, &page_tokens)?;
    let chunks = assemble(&store, &request)?;
    let prompt = render_prompt(&chunks, instruction);

    let output = runner
        .generate(image, &prompt)
        .with_context(|| format!("Model run failed for {}", image.display()))?;
    info!(
        event = "cli.prompt_completed",
        chunks = chunks.len(),
        prompt_chars = prompt.len()
    );
    Ok((prompt, output))
}
