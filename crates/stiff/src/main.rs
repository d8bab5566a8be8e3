use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fin_morph::Lemmatizer;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use wordnet_db::LoadMode;

use stiff::convert::eurosense::{self, LemmaFixer};
use stiff::convert::{names, senseval, unified};
use stiff::corpus::CorpusPaths;
use stiff::filter::{FilterResources, needs_wordnets};
use stiff::methods::{self, METHODS};
use stiff::tag::tag_corpus;
use stiff::{Config, Extractor, Lang, Pipeline, StiffError};

#[derive(Parser)]
#[command(name = "stiff")]
#[command(about = "Sense-tagged instances for Finnish from Finnish-Chinese subtitles")]
struct Cli {
    #[command(flatten)]
    resources: ResourceArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the environment configuration.
#[derive(Args)]
struct ResourceArgs {
    /// Princeton WordNet dict directory [env: WORDNET_DIR]
    #[arg(long, global = true)]
    wordnet_dir: Option<PathBuf>,
    /// mmap or owned [env: WORDNET_LOAD_MODE]
    #[arg(long, global = true, value_parser = parse_load_mode)]
    wordnet_mode: Option<LoadMode>,
    /// Directory of wn-data-<id>.tab files [env: STIFF_WORDNETS]
    #[arg(long, global = true)]
    wordnets: Option<PathBuf>,
    /// Directory with analyses.tsv and postags.tsv [env: STIFF_MORPH]
    #[arg(long, global = true)]
    morph: Option<PathBuf>,
    /// [env: STIFF_LEMMA_COUNTS]
    #[arg(long, global = true)]
    lemma_counts: Option<PathBuf>,
    /// [env: STIFF_T2S]
    #[arg(long, global = true)]
    t2s: Option<PathBuf>,
    /// [env: BABEL2WN_MAP]
    #[arg(long, global = true)]
    babel_map: Option<PathBuf>,
}

#[derive(Args)]
struct Io {
    /// Read from this file instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag a parallel corpus directory, writing STIFF
    Tag {
        corpus_dir: PathBuf,
        /// Chinese variant of the file names: zh_cn or zh_tw
        #[arg(long, default_value = "zh_cn")]
        zh: String,
        /// Stop after this many sentences
        #[arg(long)]
        head: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Apply filters in sequence, e.g. `stiff filter "lang fi" "freq dom" rm-ambg`
    Filter {
        #[arg(required = true)]
        specs: Vec<String>,
        #[command(flatten)]
        io: Io,
    },
    /// Format conversions and Eurosense clean-up
    Munge {
        #[command(subcommand)]
        munge: Munge,
    },
    /// Run a named method
    Pipeline {
        method: String,
        #[command(flatten)]
        io: Io,
        /// Write each stage to this directory [env: EUROSENSE_PIPELINE_TMPDIR]
        #[arg(long)]
        tmpdir: Option<PathBuf>,
    },
    /// Run every method over one input
    Variants {
        #[command(subcommand)]
        variants: Variants,
    },
    /// The method registry
    Methods {
        #[command(subcommand)]
        view: MethodsView,
    },
}

#[derive(Subcommand)]
enum Munge {
    StiffToUnified {
        /// Keyfile to write
        keys: PathBuf,
        #[command(flatten)]
        io: Io,
    },
    EurosenseToUnified {
        keys: PathBuf,
        #[arg(long, default_value = "fi")]
        lang: Lang,
        #[command(flatten)]
        io: Io,
    },
    UnifiedToSenseval {
        /// Keyfile of the Unified input
        keys: PathBuf,
        out_dir: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(long, default_value = "fi")]
        lang: Lang,
    },
    SensevalGather {
        dir: PathBuf,
        keys: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "fi")]
        lang: Lang,
    },
    SensevalPosTag {
        #[command(flatten)]
        io: Io,
    },
    BabelToWordnet {
        #[command(flatten)]
        io: Io,
    },
    LemmaFix {
        /// Keep annotations whose lemma cannot be resolved
        #[arg(long)]
        keep_unknown: bool,
        #[command(flatten)]
        io: Io,
    },
    Reanchor {
        #[command(flatten)]
        io: Io,
    },
    RetagLanguage {
        #[command(flatten)]
        io: Io,
    },
    StiffToNames {
        #[command(flatten)]
        io: Io,
    },
    KeyToNames {
        #[command(flatten)]
        io: Io,
    },
}

#[derive(Subcommand)]
enum Variants {
    /// Write `<dir>/<method>.xml` for every method
    Proc { input: PathBuf, dir: PathBuf },
}

#[derive(Subcommand)]
enum MethodsView {
    List {
        #[arg(long)]
        json: bool,
    },
    Tree,
    Latex,
    Dot,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_broken_pipe(&err) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.resources);
    match cli.command {
        Commands::Tag {
            corpus_dir,
            zh,
            head,
            output,
        } => {
            let wordnets = Arc::new(config.load_wordnets()?);
            let extractor = Extractor::new(wordnets, config.load_analyser()?, Box::new(config.load_tagger()?));
            let paths = CorpusPaths::in_dir(&corpus_dir, &zh);
            tag_corpus(paths, &extractor, open_output(output.as_deref())?, head)?;
        }
        Commands::Filter { specs, io } => {
            let res = filter_resources(&config, specs.iter().map(String::as_str))?;
            let pipeline = Pipeline::from_specs(specs.as_slice(), &res)?.with_trace(config.trace_pipeline);
            pipeline.run(open_input(io.input.as_deref())?, open_output(io.output.as_deref())?)?;
        }
        Commands::Munge { munge } => run_munge(&config, munge)?,
        Commands::Pipeline { method, io, tmpdir } => {
            let method = methods::lookup(&method)?;
            let res = filter_resources(&config, method.stages.iter().copied())?;
            let pipeline = Pipeline::from_method(method, &res)?.with_trace(config.trace_pipeline);
            let input = open_input(io.input.as_deref())?;
            let output = open_output(io.output.as_deref())?;
            match tmpdir.or(config.pipeline_tmpdir) {
                Some(dir) => {
                    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
                    pipeline.run_staged(input, output, &dir)?
                }
                None => pipeline.run(input, output)?,
            };
        }
        Commands::Variants {
            variants: Variants::Proc { input, dir },
        } => {
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
            let res = filter_resources(&config, METHODS.iter().flat_map(|m| m.stages.iter().copied()))?;
            for method in METHODS {
                let out_path = dir.join(format!("{}.xml", method.name));
                info!(method = method.code, path = %out_path.display(), "running variant");
                let pipeline = Pipeline::from_method(method, &res)?.with_trace(config.trace_pipeline);
                pipeline.run(open_input(Some(input.as_path()))?, open_output(Some(out_path.as_path()))?)?;
            }
        }
        Commands::Methods { view } => {
            let mut out = io::stdout().lock();
            match view {
                MethodsView::List { json: true } => {
                    serde_json::to_writer_pretty(&mut out, METHODS)?;
                    writeln!(out)?;
                }
                MethodsView::List { json: false } => {
                    for m in METHODS {
                        writeln!(
                            out,
                            "{}\t{}\t{}\t{}",
                            m.code,
                            m.name,
                            m.parent.unwrap_or("-"),
                            m.stages.join(" | ")
                        )?;
                    }
                }
                MethodsView::Tree => write!(out, "{}", methods::render_tree())?,
                MethodsView::Latex => write!(out, "{}", methods::render_latex())?,
                MethodsView::Dot => write!(out, "{}", methods::render_dot())?,
            }
        }
    }
    Ok(())
}

fn run_munge(config: &Config, munge: Munge) -> Result<()> {
    match munge {
        Munge::StiffToUnified { keys, io } => {
            unified::stiff_to_unified(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                open_output(Some(keys.as_path()))?,
            )?;
        }
        Munge::EurosenseToUnified { keys, lang, io } => {
            unified::eurosense_to_unified(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                open_output(Some(keys.as_path()))?,
                lang,
            )?;
        }
        Munge::UnifiedToSenseval {
            keys,
            out_dir,
            input,
            lang,
        } => {
            senseval::scatter(
                open_input(input.as_deref())?,
                open_input(Some(keys.as_path()))?,
                &out_dir,
                lang.as_str(),
            )?;
        }
        Munge::SensevalGather {
            dir,
            keys,
            output,
            lang,
        } => {
            senseval::gather(&dir, open_output(output.as_deref())?, open_output(Some(keys.as_path()))?, lang.as_str())?;
        }
        Munge::SensevalPosTag { io } => {
            let tagger = config.load_tagger()?;
            let contexts = senseval::pos_tag(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                &tagger,
            )?;
            info!(contexts, "tagged senseval contexts");
        }
        Munge::BabelToWordnet { io } => {
            let map = config.load_babel_map()?;
            eurosense::babel_to_wordnet(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                &map,
            )?;
        }
        Munge::LemmaFix { keep_unknown, io } => {
            let wordnets = config.load_wordnets()?;
            let lemmatizer = Lemmatizer::new(config.load_analyser()?);
            let fixer = LemmaFixer::new(&wordnets, &lemmatizer, keep_unknown);
            eurosense::lemma_fix(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                &fixer,
            )?;
        }
        Munge::Reanchor { io } => {
            let wordnets = config.load_wordnets()?;
            eurosense::reanchor(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                &wordnets,
            )?;
        }
        Munge::RetagLanguage { io } => {
            eurosense::retag_language(open_input(io.input.as_deref())?, open_output(io.output.as_deref())?)?;
        }
        Munge::StiffToNames { io } => {
            let wordnets = config.load_wordnets()?;
            names::stiff_to_names(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                &wordnets,
            )?;
        }
        Munge::KeyToNames { io } => {
            let wordnets = config.load_wordnets()?;
            names::keyfile_to_names(
                open_input(io.input.as_deref())?,
                open_output(io.output.as_deref())?,
                &wordnets,
            )?;
        }
    }
    Ok(())
}

fn load_config(args: ResourceArgs) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = args.wordnet_dir {
        config.wordnet_dir = dir;
    }
    if let Some(mode) = args.wordnet_mode {
        config.wordnet_mode = mode;
    }
    if let Some(dir) = args.wordnets {
        config.tab_dir = dir;
    }
    if let Some(dir) = args.morph {
        config.morph_dir = dir;
    }
    config.lemma_counts = args.lemma_counts.or(config.lemma_counts);
    config.t2s = args.t2s.or(config.t2s);
    config.babel_map = args.babel_map.or(config.babel_map);
    config
}

fn filter_resources<'a>(config: &Config, specs: impl IntoIterator<Item = &'a str>) -> Result<FilterResources> {
    let mut res = FilterResources::default();
    if specs.into_iter().any(needs_wordnets) {
        res.wordnets = Some(Arc::new(config.load_wordnets()?));
    }
    Ok(res)
}

fn parse_load_mode(raw: &str) -> Result<LoadMode, String> {
    LoadMode::parse(raw).ok_or_else(|| format!("expected mmap or owned, got {raw:?}"))
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    })
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<StiffError>()
            .is_some_and(StiffError::is_broken_pipe)
            || cause
                .downcast_ref::<io::Error>()
                .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
