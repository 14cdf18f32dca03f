use {
    reqwest::{Client, ClientBuilder},
    std::{
        fmt::{self, Display, Formatter},
        time::Duration,
    },
};

const USER_AGENT: &str = concat!("safe-overview/", env!("CARGO_PKG_VERSION"));

/// Builds the client shared by the chain config loader and both gateway
/// overview sources.
///
/// The timeout bounds a whole overview batch request: when it elapses every
/// Safe of that partition resolves to a fetch error.
#[derive(Clone, Debug)]
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(args: &Arguments) -> Self {
        Self {
            timeout: args.http_timeout,
        }
    }

    /// Creates the gateway client.
    pub fn create(&self) -> reqwest::Result<Client> {
        ClientBuilder::new()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
    }
}

/// Command line arguments for the gateway HTTP client.
#[derive(clap::Parser)]
#[group(skip)]
pub struct Arguments {
    /// Timeout for a single gateway request. A batch that runs into it fails
    /// as a whole.
    #[clap(
        long,
        env,
        default_value = "10s",
        value_parser = humantime::parse_duration,
    )]
    pub http_timeout: Duration,
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self { http_timeout } = self;

        writeln!(f, "http_timeout: {http_timeout:?}")
    }
}

#[cfg(test)]
mod tests {
    use {super::*, clap::Parser};

    #[test]
    fn parses_timeout() {
        let args = Arguments::try_parse_from(["test", "--http-timeout", "1500ms"]).unwrap();
        assert_eq!(args.http_timeout, Duration::from_millis(1500));
        assert!(HttpClientFactory::new(&args).create().is_ok());
    }
}
