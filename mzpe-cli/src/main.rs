use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mzpe_core::{DirectoryKind, Header, Image};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Simple PE introspection CLI
#[derive(Parser)]
#[command(
    name = "mzpe",
    about = "Inspect PE images (headers, data directories, and sections)",
    version,
    author
)]
struct Cli {
    /// Path to a PE image (EXE, DLL, SYS, EFI)
    #[arg(required = true)]
    path: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the DOS, COFF, and optional headers
    Headers,
    /// List the data directory table
    Directories {
        /// Only show this directory (e.g. `import`, `tls`)
        #[arg(long)]
        kind: Option<DirectoryKind>,
    },
    /// List all sections
    Sections,
    /// Hex dump the raw data of one section
    Dump {
        /// Section name, e.g. `.text`
        section: String,
        /// Stop after this many bytes
        #[arg(long, default_value_t = 256)]
        limit: usize,
    },
    /// Print the decoded image as JSON
    Json,
}

#[derive(Tabled)]
struct SectionRow {
    #[tabled(rename = "Section")]
    name: String,
    #[tabled(rename = "VA")]
    virtual_address: String,
    #[tabled(rename = "VSize")]
    virtual_size: String,
    #[tabled(rename = "Offset")]
    raw_pointer: String,
    #[tabled(rename = "RawSize")]
    raw_size: String,
    #[tabled(rename = "Perm")]
    perm: String,
    #[tabled(rename = "Flags")]
    flags: String,
}

#[derive(Tabled)]
struct DirectoryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Directory")]
    name: String,
    #[tabled(rename = "RVA")]
    virtual_address: String,
    #[tabled(rename = "Size")]
    size: String,
}

fn print_headers(image: &Image) {
    let dos = image.dos_header();
    let coff = image.coff_header();
    let opt = image.optional_header();

    println!("{}", "DOS header".bold());
    println!("  e_lfanew:            {:#x}", dos.e_lfanew);
    println!("  stub size:           {} bytes", image.stub().len());

    println!("{}", "COFF header".bold());
    println!("  machine:             {}", coff.machine);
    println!("  sections:            {}", coff.number_of_sections);
    println!("  timestamp:           {:#x}", coff.time_date_stamp);
    println!("  optional hdr size:   {}", coff.size_of_optional_header);
    println!("  characteristics:     {:?}", coff.characteristics);

    println!("{} ({})", "Optional header".bold(), opt.format_name().cyan());
    let (major, minor) = opt.linker_version();
    println!("  linker:              {major}.{minor}");
    println!("  entry point:         0x{:x}", opt.entry_point());
    println!("  image base:          0x{:x}", opt.image_base());
    println!("  section alignment:   {:#x}", opt.section_alignment());
    println!("  file alignment:      {:#x}", opt.file_alignment());
    println!("  size of image:       {:#x}", opt.size_of_image());
    println!("  size of headers:     {:#x}", opt.size_of_headers());
    println!("  checksum:            {:#x}", opt.checksum());
    println!("  subsystem:           {}", opt.subsystem());
    println!("  dll characteristics: {:?}", opt.dll_characteristics());
    println!(
        "  stack:               reserve {:#x}, commit {:#x}",
        opt.size_of_stack_reserve(),
        opt.size_of_stack_commit()
    );
    println!(
        "  heap:                reserve {:#x}, commit {:#x}",
        opt.size_of_heap_reserve(),
        opt.size_of_heap_commit()
    );
    if let Some(pe32) = opt.as_pe32() {
        println!("  base of data:        {:#x}", pe32.base_of_data);
    }
}

fn print_directories(image: &Image, kind: Option<DirectoryKind>) {
    let rows: Vec<DirectoryRow> = image
        .data_directories()
        .iter()
        .enumerate()
        .filter(|(_, dir)| kind.is_none() || dir.name.kind() == kind)
        .map(|(index, dir)| DirectoryRow {
            index,
            name: dir.name.to_string(),
            virtual_address: format!("0x{:x}", dir.virtual_address),
            size: format!("0x{:x}", dir.size),
        })
        .collect();

    if rows.is_empty() {
        println!("No matching data directories.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn print_sections(image: &Image) {
    if image.sections().is_empty() {
        println!("No sections found.");
        return;
    }
    let rows = image.sections().iter().map(|s| SectionRow {
        name: s.name().to_string(),
        virtual_address: format!("0x{:x}", s.header.virtual_address),
        virtual_size: format!("0x{:x}", s.header.virtual_size),
        raw_pointer: format!("0x{:x}", s.header.pointer_to_raw_data),
        raw_size: format!("0x{:x}", s.header.size_of_raw_data),
        perm: s.header.flags_string(),
        flags: format!("0x{:08x}", s.header.characteristics.bits()),
    });
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn dump_section(image: &Image, name: &str, limit: usize) -> Result<()> {
    let section = image
        .section(name)
        .with_context(|| format!("no section named `{name}`"))?;
    let base = section.header.pointer_to_raw_data as usize;
    let data = &section.data()[..section.raw_len().min(limit)];

    for (row, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        println!(
            "{} {:<47}  {}",
            format!("{:08x}", base + row * 16).dimmed(),
            hex.join(" "),
            ascii
        );
    }
    if section.raw_len() > limit {
        log::info!("{} of {} bytes shown", limit, section.raw_len());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let image = match Image::from_file(&cli.path) {
        Ok(image) => image,
        Err(err) if err.is_format() => {
            let offset = err.offset().unwrap_or_default();
            eprintln!(
                "{} {} at {:#x}: {}",
                "not a valid PE image:".red().bold(),
                err.kind_name(),
                offset,
                err
            );
            std::process::exit(2);
        }
        Err(err) => return Err(err.into()),
    };

    match cli.command {
        Command::Headers => print_headers(&image),
        Command::Directories { kind } => print_directories(&image, kind),
        Command::Sections => print_sections(&image),
        Command::Dump { section, limit } => dump_section(&image, &section, limit)?,
        Command::Json => {
            let json = serde_json::to_string_pretty(&image)?;
            println!("{json}");
        }
    }

    Ok(())
}
