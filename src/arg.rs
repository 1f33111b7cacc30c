use std::ffi::OsString;
use std::str::FromStr;

use aws_types::region::Region;
use clap::Parser;
use regex::Regex;
use thiserror::Error;

/// Long flags that are also accepted with a single leading dash.
const SINGLE_DASH_FLAGS: &[&str] = &["input", "with-id", "from-time", "to-time", "with-word"];

fn region(s: &str) -> std::result::Result<Region, clap::Error> {
    Ok(Region::new(s.to_owned()))
}

/// Filter a gzip-compressed JSON Lines object in Amazon S3 with S3 Select
#[derive(Parser, Clone, Debug)]
#[command(
    name = "s3filter",
    arg_required_else_help = true,
    version,
    long_about(
        r#"
Filter a gzip-compressed JSON Lines object in Amazon S3 with S3 Select

Every record is expected to carry `id`, `time` and `words` fields.
Matching records are streamed to stdout as JSON.

The authorization flow is the following chain:
  * use credentials from arguments provided by users
  * use environment variable credentials: AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY
  * use credentials via aws file profile.
    Profile can be set via environment variable AWS_PROFILE
    Profile file can be set via environment variable AWS_SHARED_CREDENTIALS_FILE
  * use AWS instance IAM profile
  * use AWS container IAM profile
"#
    )
)]
pub struct FilterOpt {
    /// S3 object to filter. It should be s3://bucket/key
    #[arg(name = "input", long = "input")]
    pub input: S3Location,

    /// Select only the records with this `id`
    #[arg(name = "with-id", long = "with-id", allow_negative_numbers = true)]
    pub with_id: Option<i64>,

    /// RFC3339 timestamp: the earliest `time` of a selected record
    #[arg(name = "from-time", long = "from-time")]
    pub from_time: Option<String>,

    /// RFC3339 timestamp: the latest `time` of a selected record
    #[arg(name = "to-time", long = "to-time")]
    pub to_time: Option<String>,

    /// A word that must be contained in `words` of a selected record
    #[arg(name = "with-word", long = "with-word", allow_hyphen_values = true)]
    pub with_word: Option<String>,

    /// AWS access key. Unrequired.
    #[arg(
        name = "aws-access-key",
        long = "aws-access-key",
        requires_all = &["aws-secret-key"]
    )]
    pub aws_access_key: Option<String>,

    /// AWS secret key from AWS credential pair. Required only for the credential based authentication.
    #[arg(
        name = "aws-secret-key",
        long = "aws-secret-key",
        requires_all = &["aws-access-key"]
    )]
    pub aws_secret_key: Option<String>,

    /// The region to use. The default region provider chain is used when unset
    #[arg(name = "aws-region", long = "aws-region", value_parser = region)]
    pub aws_region: Option<Region>,

    /// Custom S3 endpoint, e.g. for LocalStack or MinIO
    #[arg(name = "endpoint-url", long = "endpoint-url")]
    pub endpoint_url: Option<String>,

    /// Print a summary to stderr after the records
    #[arg(name = "summarize", long, short)]
    pub summarize: bool,
}

impl FilterOpt {
    /// Parses the process arguments, accepting the single-dash flag spelling too.
    pub fn from_env() -> Self {
        FilterOpt::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrites `-input value` and `-input=value` style flags into their
/// double-dash form. Everything else is passed through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some(s) if is_single_dash_flag(s) => OsString::from(format!("-{}", s)),
            _ => arg,
        })
        .collect()
}

fn is_single_dash_flag(arg: &str) -> bool {
    let Some(flag) = arg.strip_prefix('-') else {
        return false;
    };
    if flag.starts_with('-') {
        return false;
    }
    let name = flag.split_once('=').map(|(name, _)| name).unwrap_or(flag);
    SINGLE_DASH_FLAGS.contains(&name)
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid s3 object uri, it should be s3://bucket/key")]
    S3Parse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl FromStr for S3Location {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, anyhow::Error> {
        let regex = Regex::new(r"^s3://([^/]+)/([^/]+)$")?;
        let captures = regex.captures(s).ok_or(FilterError::S3Parse)?;

        let bucket = captures
            .get(1)
            .map(|x| x.as_str().to_owned())
            .ok_or(FilterError::S3Parse)?;
        let key = captures
            .get(2)
            .map(|x| x.as_str().to_owned())
            .ok_or(FilterError::S3Parse)?;

        Ok(S3Location { bucket, key })
    }
}

impl std::fmt::Display for S3Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_correct() {
        let region_result = region("us-west-2");
        assert!(region_result.is_ok());

        let r = region_result.unwrap();
        assert_eq!(r.as_ref(), "us-west-2");
    }

    #[test]
    fn s3location_correct() {
        assert_eq!(
            "s3://bucket/key".parse().ok(),
            Some(S3Location {
                bucket: "bucket".to_owned(),
                key: "key".to_owned(),
            })
        );

        assert_eq!(
            "s3://logs-2024/events.json.gz".parse().ok(),
            Some(S3Location {
                bucket: "logs-2024".to_owned(),
                key: "events.json.gz".to_owned(),
            })
        );
    }

    #[test]
    fn s3location_incorrect() {
        assert!("s3://bucketonly".parse::<S3Location>().is_err());
        assert!("notanuri".parse::<S3Location>().is_err());
        assert!("s3://bucket/".parse::<S3Location>().is_err());
        assert!("s3:///key".parse::<S3Location>().is_err());
        assert!("s3://bucket/nested/key".parse::<S3Location>().is_err());
        assert!("s3:/bucket/key".parse::<S3Location>().is_err());
        assert!("as3://bucket/key".parse::<S3Location>().is_err());
        assert!("".parse::<S3Location>().is_err());
    }

    #[test]
    fn s3location_display() {
        let location = S3Location {
            bucket: "bucket".to_owned(),
            key: "key".to_owned(),
        };
        assert_eq!(location.to_string(), "s3://bucket/key");
    }

    #[test]
    fn normalize_single_dash_flags() {
        let args = normalize_args([
            "s3filter",
            "-input",
            "s3://bucket/key",
            "-with-id=7",
            "--from-time",
            "2020-01-01T00:00:00Z",
            "-to-time",
            "-with-word",
            "-5",
            "-s",
            "-unknown",
        ]);

        let expected: Vec<OsString> = [
            "s3filter",
            "--input",
            "s3://bucket/key",
            "--with-id=7",
            "--from-time",
            "2020-01-01T00:00:00Z",
            "--to-time",
            "--with-word",
            "-5",
            "-s",
            "-unknown",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        assert_eq!(args, expected);
    }

    #[test]
    fn parse_all_flags() {
        let opts = FilterOpt::try_parse_from(normalize_args([
            "s3filter",
            "-input",
            "s3://bucket/key",
            "-with-id",
            "42",
            "-from-time",
            "2020-01-01T00:00:00Z",
            "-to-time",
            "2020-12-31T23:59:59Z",
            "-with-word",
            "rust",
            "--aws-region",
            "eu-west-1",
        ]))
        .unwrap();

        assert_eq!(
            opts.input,
            S3Location {
                bucket: "bucket".to_owned(),
                key: "key".to_owned(),
            }
        );
        assert_eq!(opts.with_id, Some(42));
        assert_eq!(opts.from_time.as_deref(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(opts.to_time.as_deref(), Some("2020-12-31T23:59:59Z"));
        assert_eq!(opts.with_word.as_deref(), Some("rust"));
        assert_eq!(opts.aws_region, Some(Region::new("eu-west-1")));
        assert!(!opts.summarize);
    }

    #[test]
    fn parse_word_with_leading_hyphen() {
        let opts = FilterOpt::try_parse_from(normalize_args([
            "s3filter",
            "-input",
            "s3://bucket/key",
            "-with-word",
            "-rust",
        ]))
        .unwrap();

        assert_eq!(opts.with_word.as_deref(), Some("-rust"));
    }

    #[test]
    fn parse_requires_input() {
        assert!(FilterOpt::try_parse_from(["s3filter", "--with-id", "1"]).is_err());
        assert!(FilterOpt::try_parse_from(["s3filter", "--input", "notanuri"]).is_err());
    }

    #[test]
    fn parse_requires_credential_pair() {
        let result = FilterOpt::try_parse_from([
            "s3filter",
            "--input",
            "s3://bucket/key",
            "--aws-access-key",
            "access",
        ]);
        assert!(result.is_err());
    }
}
