use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    #[envconfig(default = "10")]
    pub s2_min_level: u8,

    #[envconfig(default = "14")]
    pub s2_max_level: u8,

    #[envconfig(default = "false")]
    pub enable_metrics: bool,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: bool,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            s2_min_level: 10,
            s2_max_level: 14,
            enable_metrics: false,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::init_from_hashmap(&Default::default()).unwrap();
        assert_eq!(config.address, "127.0.0.1:3000".parse().unwrap());
        assert_eq!((config.s2_min_level, config.s2_max_level), (10, 14));
        assert!(!config.enable_metrics);
    }
}
