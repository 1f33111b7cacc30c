use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, meta::credentials::CredentialsProviderChain};
use aws_sdk_s3::{Client, config::Credentials};

use crate::arg::FilterOpt;

pub async fn setup_client(args: &FilterOpt) -> Client {
    let FilterOpt {
        aws_access_key,
        aws_secret_key,
        aws_region,
        endpoint_url,
        ..
    } = args;

    let region_provider = match aws_region {
        Some(region) => RegionProviderChain::first_try(region.to_owned()),
        None => RegionProviderChain::default_provider(),
    };

    let loader = aws_config::ConfigLoader::default()
        .behavior_version(BehaviorVersion::latest())
        .region(region_provider);

    let shared_config = match (aws_access_key, aws_secret_key) {
        (Some(aws_access_key), Some(aws_secret_key)) => {
            let credentials_provider =
                Credentials::new(aws_access_key, aws_secret_key, None, None, "static");
            loader.credentials_provider(credentials_provider).load().await
        }
        _ => {
            let credentials_provider = CredentialsProviderChain::default_provider().await;
            loader.credentials_provider(credentials_provider).load().await
        }
    };

    let mut s3_config = aws_sdk_s3::config::Builder::from(&shared_config);
    if let Some(endpoint_url) = endpoint_url {
        s3_config = s3_config.endpoint_url(endpoint_url).force_path_style(true);
    }

    Client::from_conf(s3_config.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::S3Location;

    use aws_types::region::Region;

    use std::str::FromStr;

    fn opts() -> FilterOpt {
        FilterOpt {
            input: S3Location::from_str("s3://mock-bucket/mock-key").unwrap(),
            with_id: None,
            from_time: None,
            to_time: None,
            with_word: None,
            aws_access_key: Some("mock_access".to_string()),
            aws_secret_key: Some("mock_secret".to_string()),
            aws_region: Some(Region::new("mock-region")),
            endpoint_url: None,
            summarize: false,
        }
    }

    #[tokio::test]
    async fn test_get_s3_client() {
        let client_with_creds = setup_client(&opts()).await;

        let args_without_creds = FilterOpt {
            aws_access_key: None,
            aws_secret_key: None,
            ..opts()
        };
        let client_without_creds = setup_client(&args_without_creds).await;

        assert_eq!(
            client_with_creds.config().region(),
            Some(&Region::new("mock-region"))
        );
        assert!(client_without_creds.config().region().is_some());
    }

    #[tokio::test]
    async fn test_get_s3_client_with_endpoint() {
        let args = FilterOpt {
            endpoint_url: Some("http://localhost:4566".to_owned()),
            ..opts()
        };
        let client = setup_client(&args).await;

        assert_eq!(
            client.config().region(),
            Some(&Region::new("mock-region"))
        );
    }
}
