use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use cpai::config::ConfigLayer;
use cpai::logging::init_logger;
use cpai::runner::{
    CopyOptions, Invocation, ScanOptions, WatchOptions, run_copy, run_init, run_scan, run_watch,
};
use cpai::{OutputFormat, PackOrder};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    #[value(alias = "markdown")]
    Md,
    Plain,
    Json,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Md => OutputFormat::Markdown,
            CliOutputFormat::Plain => OutputFormat::Plain,
            CliOutputFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPackOrder {
    SmallFirst,
    LargeFirst,
    Path,
}

impl From<CliPackOrder> for PackOrder {
    fn from(o: CliPackOrder) -> Self {
        match o {
            CliPackOrder::SmallFirst => PackOrder::SmallFirst,
            CliPackOrder::LargeFirst => PackOrder::LargeFirst,
            CliPackOrder::Path => PackOrder::Path,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cpai", version, about = "Bundle project files into one LLM prompt under a token budget", long_about = None)]
struct Cli {
    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List files with their size, line and token counts
    Scan {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Print a JSON report instead of the table
        #[arg(long)]
        json: bool,

        /// Show the heaviest directories
        #[arg(long)]
        by_dir: bool,

        /// Classify files on N workers with a progress bar
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Pack and render a bundle to stdout, a file or the clipboard
    Copy {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Copy output to clipboard
        #[arg(short, long)]
        clip: bool,

        /// Show the heaviest directories of the selection
        #[arg(long)]
        by_dir: bool,

        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Rewrite a bundle file whenever the project changes
    Watch {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Bundle file to keep up to date
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write the default configuration
    Init {
        /// Project directory
        dir: Option<PathBuf>,

        /// Write ~/.cpai/config.json instead of .cpairc.json
        #[arg(long)]
        global: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags shared by every command that scans.
#[derive(Args, Debug, Clone)]
struct SelectionArgs {
    /// Directory to scan
    dir: Option<PathBuf>,

    /// Named profile from the config files
    #[arg(long)]
    profile: Option<String>,

    /// Include globs (comma separated)
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// Exclude globs (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Do not honour .gitignore
    #[arg(long)]
    no_gitignore: bool,

    /// Do not honour .cpaiignore
    #[arg(long)]
    no_cpai_ignore: bool,

    /// Include hidden files
    #[arg(long)]
    hidden: bool,

    /// Skip files larger than this many bytes
    #[arg(long)]
    max_bytes_per_file: Option<u64>,

    /// Model name used to pick the tokenizer encoding
    #[arg(long)]
    model: Option<String>,

    /// Explicit tokenizer encoding
    #[arg(long)]
    encoding: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Token budget for the bundle
    #[arg(long)]
    max_tokens: Option<usize>,

    #[arg(long, value_enum)]
    pack_order: Option<CliPackOrder>,

    /// Trust the estimate instead of measuring the rendered bundle
    #[arg(long)]
    no_strict: bool,

    /// Markdown without code fences
    #[arg(long)]
    no_code_fences: bool,

    /// Text placed before the files
    #[arg(long)]
    header: Option<String>,

    /// Separator between files in plain output
    #[arg(long)]
    block_separator: Option<String>,

    /// Wrap the bundle in an XML document
    #[arg(long)]
    xml: bool,

    /// Wrap the bundle in <TREE>/<FILE_n> tags
    #[arg(long, conflicts_with = "no_tags")]
    tags: bool,

    #[arg(long)]
    no_tags: bool,

    /// Instructions placed around the bundle
    #[arg(long)]
    prompt: Option<String>,

    /// Read the instructions from a file
    #[arg(long)]
    prompt_file: Option<String>,

    /// Saved prompts to compose, by name (comma separated)
    #[arg(long, value_delimiter = ',')]
    use_prompt: Vec<String>,

    /// Extra directory to look for saved prompts in
    #[arg(long)]
    prompts_dir: Option<PathBuf>,

    /// Include file bodies in JSON output
    #[arg(long)]
    json_bodies: bool,
}

fn flag(set: bool, value: bool) -> Option<bool> {
    set.then_some(value)
}

impl SelectionArgs {
    fn into_invocation(self) -> Invocation {
        let tags_wrap = if self.no_tags {
            Some(false)
        } else {
            flag(self.tags, true)
        };
        let flags = ConfigLayer {
            include: (!self.include.is_empty()).then_some(self.include),
            exclude: (!self.exclude.is_empty()).then_some(self.exclude),
            use_gitignore: flag(self.no_gitignore, false),
            use_cpai_ignore: flag(self.no_cpai_ignore, false),
            hidden: flag(self.hidden, true),
            max_bytes_per_file: self.max_bytes_per_file,
            model: self.model,
            encoding: self.encoding,
            format: self.format.map(Into::into),
            max_tokens: self.max_tokens,
            pack_order: self.pack_order.map(Into::into),
            strict: flag(self.no_strict, false),
            code_fences: flag(self.no_code_fences, false),
            header: self.header,
            block_separator: self.block_separator,
            xml_wrap: flag(self.xml, true),
            tags_wrap,
            prompt: self.prompt,
            prompt_file: self.prompt_file,
            json_bodies: flag(self.json_bodies, true),
            ..Default::default()
        };
        Invocation {
            root: self.dir.unwrap_or_else(|| PathBuf::from(".")),
            profile: self.profile,
            flags,
            use_prompts: self.use_prompt,
            prompts_dir: self.prompts_dir,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Command::Scan {
            selection,
            json,
            by_dir,
            concurrency,
        } => run_scan(
            &selection.into_invocation(),
            &ScanOptions {
                json,
                by_dir,
                concurrency,
            },
        ),
        Command::Copy {
            selection,
            output,
            clip,
            by_dir,
            concurrency,
        } => run_copy(
            &selection.into_invocation(),
            &CopyOptions {
                output,
                clip,
                by_dir,
                concurrency,
            },
        ),
        Command::Watch { selection, output } => {
            run_watch(&selection.into_invocation(), &WatchOptions { output })
        }
        Command::Init { dir, global, force } => {
            run_init(&dir.unwrap_or_else(|| PathBuf::from(".")), global, force)
        }
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cpai", &mut std::io::stdout());
            Ok(())
        }
    }
}
