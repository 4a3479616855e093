//! CLI for care-plan generation
//!
//! `demo` replays the reference scenario: two PlanDefinitions (one with an
//! applicability condition of `true`), a patient and an encounter are stored,
//! read back and applied.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use octofhir_careplan::model::FHIRPATH_LANGUAGE;
use octofhir_careplan::{
    CarePlanEngine, ClinicalRecord, EngineConfig, GeneratedPlan, ResourceKind, parse,
};
use serde_json::Value;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "octofhir-careplan")]
#[command(about = "Apply FHIR PlanDefinitions to a patient and encounter")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the sample records and generate both sample care plans
    Demo {
        /// Keep records in this directory instead of in memory
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Do not store the ActivityDefinition the plans point to
        #[arg(long)]
        skip_activity_definition: bool,
    },
    /// Load resources from files and apply a PlanDefinition
    Apply {
        /// PlanDefinition id
        #[arg(long)]
        plan_definition: String,
        /// Patient id
        #[arg(long)]
        patient: String,
        /// Encounter id
        #[arg(long)]
        encounter: String,
        /// JSON files holding a resource, an array of resources or a Bundle
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Pretty-print the CarePlan
        #[arg(short, long)]
        pretty: bool,
    },
    /// Evaluate an expression against a resource
    Evaluate {
        /// Expression text
        expression: String,
        /// JSON file holding the resource (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Expression language
        #[arg(short, long, default_value = FHIRPATH_LANGUAGE)]
        language: String,
    },
    /// Parse and validate expression syntax
    Parse {
        /// Expression text
        expression: String,
    },
}

const PLAN_DEFINITION: &str = r#"{
  "resourceType": "PlanDefinition",
  "id": "Test-PlanDefinition",
  "status": "active",
  "action": [
    {
      "definitionCanonical": "http://example.org/ActivityDefinition/ADTest"
    }
  ]
}"#;

const PLAN_DEFINITION_CONDITION: &str = r#"{
  "resourceType": "PlanDefinition",
  "id": "Test-PlanDefinitionCondition",
  "status": "active",
  "action": [
    {
      "condition": [
        {
          "kind": "applicability",
          "expression": {
            "language": "text/fhirpath",
            "expression": "true"
          }
        }
      ],
      "definitionCanonical": "http://example.org/ActivityDefinition/ADTest"
    }
  ]
}"#;

const PATIENT: &str = r#"{
  "resourceType": "Patient",
  "id": "Test-Patient",
  "gender": "female"
}"#;

const ENCOUNTER: &str = r#"{
  "resourceType": "Encounter",
  "id": "Test-Encounter",
  "status": "in-progress",
  "subject": {
    "reference": "Patient/Test-Patient"
  }
}"#;

const ACTIVITY_DEFINITION: &str = r#"{
  "resourceType": "ActivityDefinition",
  "id": "ADTest",
  "url": "http://example.org/ActivityDefinition/ADTest",
  "status": "active",
  "kind": "ServiceRequest",
  "description": "Test activity"
}"#;

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Demo {
            data_dir,
            skip_activity_definition,
        } => run_demo(data_dir, skip_activity_definition).await,
        Commands::Apply {
            plan_definition,
            patient,
            encounter,
            files,
            pretty,
        } => run_apply(&plan_definition, &patient, &encounter, &files, pretty).await,
        Commands::Evaluate {
            expression,
            file,
            language,
        } => run_evaluate(&expression, file.as_deref(), &language),
        Commands::Parse { expression } => run_parse(&expression),
    }
}

async fn run_demo(data_dir: Option<PathBuf>, skip_activity_definition: bool) -> Result<()> {
    let config = match data_dir {
        Some(dir) => EngineConfig::persistent(dir),
        None => EngineConfig::in_memory(),
    };
    let engine = CarePlanEngine::new(config).await?;

    let mut fixtures = vec![PLAN_DEFINITION, PLAN_DEFINITION_CONDITION, PATIENT, ENCOUNTER];
    if !skip_activity_definition {
        fixtures.push(ACTIVITY_DEFINITION);
    }
    for text in fixtures {
        let id = engine.create_json(text).await?;
        log::debug!("Stored {id}");
    }

    for (kind, id) in [
        (ResourceKind::PlanDefinition, "Test-PlanDefinition"),
        (ResourceKind::Patient, "Test-Patient"),
        (ResourceKind::Encounter, "Test-Encounter"),
    ] {
        let record = engine.get(&kind, id).await?;
        log::info!("{kind}: {}", record.to_json_string());
    }

    for plan_definition in ["Test-PlanDefinition", "Test-PlanDefinitionCondition"] {
        let care_plan = engine
            .generate_care_plan(plan_definition, "Test-Patient", "Test-Encounter")
            .await
            .with_context(|| format!("applying PlanDefinition/{plan_definition}"))?;
        log::info!("carePlan for {plan_definition}: {}", encode(&care_plan, false)?);
    }
    Ok(())
}

async fn run_apply(
    plan_definition: &str,
    patient: &str,
    encounter: &str,
    files: &[PathBuf],
    pretty: bool,
) -> Result<()> {
    let engine = CarePlanEngine::new(EngineConfig::in_memory()).await?;

    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let json: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        for resource in unpack_resources(json) {
            let record = ClinicalRecord::from_json(resource)
                .with_context(|| format!("decoding a resource in {}", path.display()))?;
            engine.create(record).await?;
        }
    }

    let care_plan = engine
        .generate_care_plan(plan_definition, patient, encounter)
        .await?;
    println!("{}", encode(&care_plan, pretty)?);
    Ok(())
}

fn run_evaluate(expression: &str, file: Option<&std::path::Path>, language: &str) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            buffer
        }
    };

    let record = ClinicalRecord::from_json_str(&text).context("decoding resource")?;
    let evaluator = octofhir_careplan::ExpressionEvaluator::default();
    let result = evaluator.evaluate(language, expression, &[&record])?;
    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}

fn run_parse(expression: &str) -> Result<()> {
    match parse(expression) {
        Ok(ast) => {
            println!("{ast:#?}");
            Ok(())
        }
        Err(e) => bail!("invalid expression: {e}"),
    }
}

/// Resources held by a file: a single resource, an array, or a Bundle's entries
fn unpack_resources(json: Value) -> Vec<Value> {
    match json {
        Value::Array(items) => items,
        Value::Object(ref object)
            if object.get("resourceType").and_then(Value::as_str) == Some("Bundle") =>
        {
            object
                .get("entry")
                .and_then(Value::as_array)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.get("resource").cloned())
                        .collect()
                })
                .unwrap_or_default()
        }
        single => vec![single],
    }
}

fn encode(care_plan: &GeneratedPlan, pretty: bool) -> Result<String> {
    let json = ClinicalRecord::CarePlan(care_plan.clone()).to_json();
    Ok(if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    })
}
