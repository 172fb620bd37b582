use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::domain::ToolType;
use crate::error::MgsError;
use crate::parsers::{self, ParsedResult};

/// File role → path for one result.
pub type Schema = IndexMap<String, PathBuf>;

pub type ParseFn = fn(&[&Path]) -> Result<ParsedResult, MgsError>;

/// How one tool type is turned into a [`ParsedResult`].
#[derive(Debug, Clone, Copy)]
pub enum ParserEntry {
    /// The file filling `role` is uploaded as-is.
    Json { role: &'static str },
    /// `parse` receives the paths of `roles`, in that order.
    Files {
        parse: ParseFn,
        roles: &'static [&'static str],
    },
}

impl ParserEntry {
    pub fn roles(&self) -> Vec<&'static str> {
        match self {
            ParserEntry::Json { role } => vec![*role],
            ParserEntry::Files { roles, .. } => roles.to_vec(),
        }
    }
}

pub fn parser_entry(tool: ToolType) -> ParserEntry {
    match tool {
        ToolType::AlphaDiversity
        | ToolType::BetaDiversity
        | ToolType::MicrobeDirectory
        | ToolType::ReadStats
        | ToolType::ReadClassProportions => ParserEntry::Json { role: "json" },
        ToolType::HmpSites => ParserEntry::Json { role: "metaphlan2" },
        ToolType::Macrobes => ParserEntry::Json { role: "tbl" },
        ToolType::MicrobeCensus => ParserEntry::Files {
            parse: microbe_census,
            roles: &["stats"],
        },
        ToolType::Kraken | ToolType::Metaphlan2 => ParserEntry::Files {
            parse: mpa,
            roles: &["mpa"],
        },
        ToolType::KrakenHll => ParserEntry::Files {
            parse: mpa,
            roles: &["report"],
        },
        ToolType::Methyltransferases | ToolType::Vfdb | ToolType::ShortbredAmrs => {
            ParserEntry::Files {
                parse: gene_table,
                roles: &["table"],
            }
        }
        ToolType::HumanAncestry => ParserEntry::Files {
            parse: key_val_file,
            roles: &["table"],
        },
        ToolType::ResistomeAmrs => ParserEntry::Files {
            parse: resistome,
            roles: &["gene", "group", "classus", "mech"],
        },
        ToolType::Humann2 => ParserEntry::Files {
            parse: humann2_pathways,
            roles: &["path_abunds", "path_cov"],
        },
        ToolType::Humann2Normalized => ParserEntry::Files {
            parse: humann2_genes,
            roles: &["read_depth_norm_genes", "ags_norm_genes"],
        },
    }
}

/// Parses the files of one result, identified by its tool type name.
pub fn parse<I, K, P>(tool_type: &str, schema: I) -> Result<ParsedResult, MgsError>
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<String>,
    P: Into<PathBuf>,
{
    let schema = schema
        .into_iter()
        .map(|(role, path)| (role.into(), path.into()))
        .collect::<Schema>();
    parse_schema(tool_type, &schema)
}

pub fn parse_schema(tool_type: &str, schema: &Schema) -> Result<ParsedResult, MgsError> {
    let Some(tool) = ToolType::from_name(tool_type) else {
        return Err(MgsError::UnparsableResultType {
            tool_type: tool_type.to_string(),
            schema: describe_schema(schema),
        });
    };

    match parser_entry(tool) {
        ParserEntry::Json { role } => parsers::parse_json(role_path(schema, role)?),
        ParserEntry::Files { parse, roles } => {
            let paths = roles
                .iter()
                .map(|role| role_path(schema, role))
                .collect::<Result<Vec<_>, _>>()?;
            parse(&paths)
        }
    }
}

fn role_path<'a>(schema: &'a Schema, role: &str) -> Result<&'a Path, MgsError> {
    schema
        .get(role)
        .map(PathBuf::as_path)
        .ok_or_else(|| MgsError::MissingRequiredField(role.to_string()))
}

fn describe_schema(schema: &Schema) -> String {
    let entries = schema
        .iter()
        .map(|(role, path)| format!("{role}: {}", path.display()))
        .collect::<Vec<_>>();
    format!("{{{}}}", entries.join(", "))
}

fn arity_error(expected: usize, found: usize) -> MgsError {
    MgsError::FormatMismatch(format!("parser expects {expected} files, received {found}"))
}

fn mpa(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [path] => parsers::parse_mpa(path),
        _ => Err(arity_error(1, paths.len())),
    }
}

fn microbe_census(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [path] => parsers::parse_microbe_census(path),
        _ => Err(arity_error(1, paths.len())),
    }
}

fn gene_table(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [path] => parsers::parse_gene_table(path),
        _ => Err(arity_error(1, paths.len())),
    }
}

fn key_val_file(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [path] => parsers::parse_key_val_file(path),
        _ => Err(arity_error(1, paths.len())),
    }
}

fn resistome(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [gene, group, classus, mech] => {
            parsers::parse_resistome_tables(gene, group, classus, mech)
        }
        _ => Err(arity_error(4, paths.len())),
    }
}

fn humann2_pathways(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [abundance, coverage] => parsers::parse_humann2_pathways(abundance, coverage),
        _ => Err(arity_error(2, paths.len())),
    }
}

fn humann2_genes(paths: &[&Path]) -> Result<ParsedResult, MgsError> {
    match paths {
        [read_depth, ags] => parsers::parse_humann2_tables(read_depth, ags),
        _ => Err(arity_error(2, paths.len())),
    }
}
