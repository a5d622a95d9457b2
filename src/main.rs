#![allow(clippy::print_stdout)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use catastro_registry::cleanup::{remove_files, FsFileCleaner};
use catastro_registry::config::AppConfig;
use catastro_registry::db::establish_connection;
use catastro_registry::logging::{init_logging, OperationTimer};
use catastro_registry::models::{construction_line, ConstructionEntry};
use catastro_registry::photos::upload_file_name;
use catastro_registry::service::{CadastreService, StoredUpload};
use catastro_registry::validation::InputValidator;
use catastro_registry::{
    CommercialLicenseStatus, CoordinateParser, IdentityValidator, InspectionStatus, NewProperty, PropertyFilter,
};

#[derive(Parser)]
#[command(name = "catastro", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a property, or overwrite the one with the same owner and role code
    Add(RecordArgs),
    /// Overwrite every field of an existing property
    Edit {
        /// Property id
        id: i64,

        #[command(flatten)]
        record: RecordArgs,
    },
    /// List properties, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        paging: PageArgs,

        /// Include photo paths with each property
        #[arg(long)]
        with_photos: bool,
    },
    /// Search identity number, owner, address and role code at once
    Search {
        /// Text to look for
        term: String,

        #[command(flatten)]
        paging: PageArgs,
    },
    /// Show one property with its photos
    Show {
        /// Property id
        id: i64,
    },
    /// Show every property registered under an identity number
    Owner {
        /// Owner identity number
        identity_number: String,
    },
    /// Delete a property, its photo records and photo files
    Delete {
        /// Property id
        id: i64,
    },
    /// Manage property photos
    #[command(subcommand)]
    Photos(PhotoCommands),
    /// Number of registered properties
    Count,
    /// Check an identity number's check character
    CheckId {
        /// Identity number, with or without separators
        identity_number: String,
    },
    /// Parse a "lat, lon" coordinate string
    ParseCoords {
        /// Coordinate text, e.g. "-33.45, -70.66"
        #[arg(allow_hyphen_values = true)]
        text: String,
    },
}

#[derive(Subcommand)]
enum PhotoCommands {
    /// List photo paths in insertion order
    List {
        /// Property id
        id: i64,
    },
    /// Replace the photo list with already stored paths
    Set {
        /// Property id
        id: i64,

        /// Photo paths, in display order
        paths: Vec<String>,
    },
    /// Copy image files into the upload directory and attach them
    Add {
        /// Property id
        id: i64,

        /// Image files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove one photo by 0-based position
    Remove {
        /// Property id
        id: i64,

        /// Position in the photo list
        index: usize,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// Owner identity number
    #[arg(long)]
    identity_number: String,

    /// Owner full name
    #[arg(long)]
    owner_name: String,

    /// Owner contact phone number
    #[arg(long)]
    contact_number: String,

    /// Street address
    #[arg(long)]
    address: String,

    /// Municipal role code
    #[arg(long)]
    role_code: String,

    /// Total assessed value
    #[arg(long)]
    assessed_value: f64,

    /// Tax office use classification
    #[arg(long)]
    tax_use: Option<String>,

    /// Municipal works use classification
    #[arg(long)]
    municipal_use: Option<String>,

    /// Commercial license status (current, delinquent, none)
    #[arg(long)]
    license: Option<CommercialLicenseStatus>,

    /// Inspection status (regularized, irregular)
    #[arg(long)]
    inspection: Option<InspectionStatus>,

    /// Location as "lat, lon"
    #[arg(long, allow_hyphen_values = true)]
    coordinates: Option<String>,

    /// Land area in square meters
    #[arg(long, default_value = "0")]
    land_area: f64,

    /// Built area in square meters
    #[arg(long, default_value = "0")]
    built_area: f64,

    /// Construction entry as "material,year,area"; repeat up to six times
    #[arg(long = "construction", value_parser = parse_construction_entry)]
    construction: Vec<ConstructionEntry>,

    /// Year of construction
    #[arg(long)]
    construction_year: Option<i32>,

    /// Municipal works file number
    #[arg(long)]
    dom_file: Option<String>,

    /// Free-text observations
    #[arg(long)]
    observations: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    /// Identity number contains
    #[arg(long)]
    identity_number: Option<String>,

    /// Owner name contains
    #[arg(long)]
    owner_name: Option<String>,

    /// Address contains
    #[arg(long)]
    address: Option<String>,

    /// Role code contains
    #[arg(long)]
    role_code: Option<String>,

    /// Tax use contains
    #[arg(long)]
    tax_use: Option<String>,

    /// Municipal use contains
    #[arg(long)]
    municipal_use: Option<String>,

    /// Exact commercial license status
    #[arg(long)]
    license: Option<CommercialLicenseStatus>,

    /// Exact inspection status
    #[arg(long)]
    inspection: Option<InspectionStatus>,
}

#[derive(Args)]
struct PageArgs {
    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    page: u32,

    /// Records per page (configured default when omitted)
    #[arg(long)]
    page_size: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_with(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging; the guard flushes the log file on exit
    let _guard = init_logging(
        Some(&config.get_log_level()),
        config.logging.file_path.as_deref().map(Path::new),
        config.logging.format == "json",
    )?;

    match cli.command {
        Commands::CheckId { identity_number } => {
            let normalized = IdentityValidator::normalize(&identity_number);
            print_json(&serde_json::json!({
                "identity_number": identity_number,
                "normalized": normalized,
                "valid": IdentityValidator::is_valid(&identity_number),
            }))
        },
        Commands::ParseCoords { text } => print_json(&CoordinateParser::parse(&text)),
        command => {
            let database = establish_connection(&config).context("Failed to open the cadastre database")?;
            let service = CadastreService::new(database).with_photo_policy(config.photos.clone());
            run(&config, &service, command)
        },
    }
}

fn run(config: &AppConfig, service: &CadastreService, command: Commands) -> Result<()> {
    match command {
        Commands::Add(args) => {
            let record = args.into_record()?;
            let id = service.register(&record)?;
            info!(id, "Property saved");
            print_json(&serde_json::json!({ "id": id }))
        },
        Commands::Edit { id, record } => {
            service.edit(id, &record.into_record()?)?;
            print_json(&service.properties().get(id)?)
        },
        Commands::List {
            filter,
            paging,
            with_photos,
        } => {
            let timer = OperationTimer::new("cli_list");
            let filter = filter.into_filter();
            let page_size = config.effective_page_size(paging.page_size);
            if with_photos {
                print_json(&service.properties().list_with_photos(paging.page, page_size, &filter)?)?;
            } else {
                print_json(&service.properties().list(paging.page, page_size, &filter)?)?;
            }
            timer.finish();
            Ok(())
        },
        Commands::Search { term, paging } => {
            let page_size = config.effective_page_size(paging.page_size);
            print_json(&service.properties().search(&term, paging.page, page_size)?)
        },
        Commands::Show { id } => {
            let property = service
                .properties()
                .get(id)?
                .with_context(|| format!("Property {id} not found"))?;
            let photos = service.photos().list_for(id)?;
            print_json(&serde_json::json!({ "property": property, "photos": photos }))
        },
        Commands::Owner { identity_number } => {
            print_json(&service.properties().find_by_identity_number(&identity_number)?)
        },
        Commands::Delete { id } => {
            let report = service.delete_property(id)?;
            print_json(&report)?;
            report
                .into_result()
                .map(|_| ())
                .context("Property deleted, but some photo files were left behind")
        },
        Commands::Photos(command) => run_photos(config, service, command),
        Commands::Count => print_json(&serde_json::json!({ "total": service.properties().total_count()? })),
        Commands::CheckId { .. } | Commands::ParseCoords { .. } => Ok(()),
    }
}

fn run_photos(config: &AppConfig, service: &CadastreService, command: PhotoCommands) -> Result<()> {
    match command {
        PhotoCommands::List { id } => print_json(&service.photos().list_for(id)?),
        PhotoCommands::Set { id, paths } => {
            service.photos().replace_all(id, &paths)?;
            print_json(&service.photos().list_for(id)?)
        },
        PhotoCommands::Add { id, files } => {
            let property = service
                .properties()
                .get(id)?
                .with_context(|| format!("Property {id} not found"))?;
            let uploads = store_uploads(config, &property.identity_number, &files)?;

            let accepted = service
                .attach_uploads(id, &uploads)
                .with_context(|| format!("Failed to attach photos to property {id}"))?;
            let rejected: Vec<String> = uploads
                .into_iter()
                .map(|upload| upload.path)
                .filter(|path| !accepted.contains(path))
                .collect();
            if !rejected.is_empty() {
                remove_files(&FsFileCleaner, &rejected);
            }

            print_json(&serde_json::json!({ "added": accepted, "rejected": rejected }))
        },
        PhotoCommands::Remove { id, index } => {
            let report = service.remove_photo(id, index)?;
            print_json(&report)
        },
    }
}

/// Copy `files` into the upload directory under generated names
fn store_uploads(config: &AppConfig, identity_number: &str, files: &[PathBuf]) -> Result<Vec<StoredUpload>> {
    let upload_dir = Path::new(&config.photos.upload_dir);
    fs::create_dir_all(upload_dir)
        .with_context(|| format!("Failed to create upload directory {}", upload_dir.display()))?;

    let timestamp = Utc::now().timestamp();
    let mut uploads = Vec::with_capacity(files.len());

    for (i, source) in files.iter().enumerate() {
        let target_name = |original_name: &str| upload_file_name(identity_number, timestamp, i + 1, original_name);
        match store_upload(config, upload_dir, source, target_name) {
            Ok(Some(upload)) => uploads.push(upload),
            Ok(None) => {},
            Err(e) => {
                discard_uploads(uploads);
                return Err(e);
            },
        }
    }

    Ok(uploads)
}

/// Copy one file, or `None` when the photo policy rejects it
fn store_upload(
    config: &AppConfig,
    upload_dir: &Path,
    source: &Path,
    target_name: impl Fn(&str) -> String,
) -> Result<Option<StoredUpload>> {
    let original_name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let size_bytes = fs::metadata(source)
        .with_context(|| format!("Cannot read {}", source.display()))?
        .len();

    if let Err(e) = InputValidator::validate_photo_upload(&original_name, size_bytes, &config.photos) {
        warn!(file = %source.display(), error = %e, "Not copying photo");
        return Ok(None);
    }

    let target = upload_dir.join(target_name(&original_name));
    fs::copy(source, &target)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;

    Ok(Some(StoredUpload {
        path: target.to_string_lossy().into_owned(),
        size_bytes,
    }))
}

/// Remove files copied for an upload that will not be attached
fn discard_uploads(uploads: Vec<StoredUpload>) {
    let paths: Vec<String> = uploads.into_iter().map(|upload| upload.path).collect();
    let report = remove_files(&FsFileCleaner, &paths);
    if !report.is_clean() {
        warn!(failed = report.failures.len(), "Some copied photos could not be removed");
    }
}

impl RecordArgs {
    fn into_record(self) -> Result<NewProperty> {
        let coordinates = match self.coordinates.as_deref() {
            Some(text) => {
                let parsed = CoordinateParser::parse(text);
                if parsed.is_none() {
                    warn!(%text, "Unreadable coordinates, location left unset");
                }
                parsed
            },
            None => None,
        };

        Ok(NewProperty {
            identity_number: InputValidator::sanitize_text(&self.identity_number),
            owner_name: InputValidator::sanitize_text(&self.owner_name),
            contact_number: InputValidator::sanitize_text(&self.contact_number),
            address: InputValidator::sanitize_text(&self.address),
            property_role_code: InputValidator::sanitize_text(&self.role_code),
            total_assessed_value: self.assessed_value,
            tax_use_code: self.tax_use,
            municipal_use_code: self.municipal_use,
            commercial_license_status: self.license,
            inspection_status: self.inspection,
            coordinates,
            land_area_m2: self.land_area,
            built_area_m2: self.built_area,
            construction_line: construction_line(&self.construction)?,
            construction_year: self.construction_year,
            dom_file_number: self.dom_file,
            observations: self.observations.map(|o| InputValidator::sanitize_text(&o)),
        })
    }
}

impl FilterArgs {
    fn into_filter(self) -> PropertyFilter {
        PropertyFilter {
            identity_number: self.identity_number,
            owner_name: self.owner_name,
            address: self.address,
            property_role_code: self.role_code,
            tax_use_code: self.tax_use,
            municipal_use_code: self.municipal_use,
            commercial_license_status: self.license,
            inspection_status: self.inspection,
        }
    }
}

/// Parse "material,year,area"; any part may be left empty
fn parse_construction_entry(raw: &str) -> std::result::Result<ConstructionEntry, String> {
    let mut parts = raw.splitn(3, ',').map(str::trim);
    let material = parts.next().filter(|m| !m.is_empty()).map(str::to_string);
    let year = match parts.next().filter(|y| !y.is_empty()) {
        Some(y) => Some(y.parse::<i32>().map_err(|e| format!("invalid year '{y}': {e}"))?),
        None => None,
    };
    let area_m2 = match parts.next().filter(|a| !a.is_empty()) {
        Some(a) => Some(a.parse::<f64>().map_err(|e| format!("invalid area '{a}': {e}"))?),
        None => None,
    };

    Ok(ConstructionEntry {
        material,
        year,
        area_m2,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
