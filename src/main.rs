#![warn(clippy::all)]
use std::io::{self, Read, Write};

use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use htmlcleaner::{
    preprocess, Result, SanitizeError, Sanitizer, SanitizerConfig, DEFAULT_CONFIG,
    RESTRICTED_CONFIG,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Common formatting, links and media
    Default,
    /// Inline formatting only
    Restricted,
    /// Nothing until allowed with --allow
    Empty,
}

/// Reads an HTML fragment on stdin and writes its sanitized form to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Escape disallowed tags in the raw input before parsing
    #[arg(long)]
    preprocess: bool,

    /// Turn comments into visible text
    #[arg(long)]
    escape_comments: bool,

    /// Wrap top level inline content in paragraphs
    #[arg(long)]
    wrap_text: bool,

    /// Maximum nesting depth, 0 for unlimited
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Keep href, src and poster values without checking their scheme
    #[arg(long)]
    allow_javascript_url: bool,

    /// Additional allowed elements
    #[arg(long, value_name = "ELEM", value_delimiter = ',')]
    allow: Vec<String>,

    /// Additional allowed attribute on an element
    #[arg(long, value_name = "ELEM:ATTR")]
    allow_attr: Vec<String>,

    /// Additional attributes allowed on every element
    #[arg(long, value_name = "ATTR", value_delimiter = ',')]
    global_attr: Vec<String>,

    /// Allowed attribute whose value must match a regex
    #[arg(long, value_name = "ELEM:ATTR=REGEX")]
    attr_match: Vec<String>,
}

fn split_rule<'a>(rule: &'a str, separator: char) -> Result<(&'a str, &'a str)> {
    match rule.split_once(separator) {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => Ok((left, right)),
        _ => Err(SanitizeError::InvalidRule(rule.to_string())),
    }
}

fn build_config(cli: &Cli) -> Result<SanitizerConfig> {
    let mut config = match cli.preset {
        Preset::Default => DEFAULT_CONFIG.clone(),
        Preset::Restricted => RESTRICTED_CONFIG.clone(),
        Preset::Empty => SanitizerConfig::empty(),
    };

    let escape_comments = config.escape_comments || cli.escape_comments;
    let wrap_text = config.wrap_text || cli.wrap_text;
    config = config
        .elem(&cli.allow)
        .global_attr(&cli.global_attr)
        .escape_comments(escape_comments)
        .wrap_text(wrap_text)
        .allow_javascript_url(cli.allow_javascript_url);
    if let Some(max_depth) = cli.max_depth {
        config = config.max_depth(max_depth);
    }

    for rule in &cli.allow_attr {
        let (elem, attr) = split_rule(rule, ':')?;
        config = config.elem_attr(elem, vec![attr]);
    }
    for rule in &cli.attr_match {
        let (target, pattern) = split_rule(rule, '=')?;
        let (elem, attr) = split_rule(target, ':')?;
        config = config.elem_attr_pattern(elem, attr, pattern)?;
    }

    debug!(?config, "built config");
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let arena = typed_arena::Arena::new();
    let sanitizer = Sanitizer::new(&arena, &config);

    if cli.preprocess {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        let sanitized = sanitizer.sanitize(&preprocess(&config, &input));
        io::stdout().write_all(sanitized.as_bytes())?;
    } else {
        sanitizer.sanitize_fragment(&mut io::stdin(), &mut io::stdout())?;
    }
    Ok(())
}
