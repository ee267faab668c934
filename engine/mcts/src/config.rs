//! MCTS configuration parameters.

/// Configuration for Monte Carlo Tree Search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Number of simulations to run per search.
    pub num_simulations: u32,

    /// Exploration constant for the PUCT formula.
    /// Higher values encourage exploration, lower values favor exploitation.
    pub c_puct: f32,

    /// Dirichlet noise alpha for root node exploration.
    /// Set to 0.0 to disable noise (for evaluation/arena play).
    pub dirichlet_alpha: f32,

    /// Fraction of the root prior that comes from Dirichlet noise.
    pub dirichlet_epsilon: f32,

    /// Temperature for action selection after search.
    /// 1.0 = sample proportional to visit counts
    /// 0.0 = always pick most-visited (argmax)
    pub temperature: f32,

    /// Descent depth at which a simulation gives up and backs up a neutral
    /// value. Guards against very long cyclic lines in movement phases.
    pub max_depth: u32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 40,
            c_puct: 1.5,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            temperature: 1.0,
            max_depth: 512,
        }
    }
}

impl MctsConfig {
    /// Create config for self-play (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation/arena play (no noise, greedy selection).
    pub fn for_evaluation() -> Self {
        Self {
            dirichlet_alpha: 0.0, // No noise
            dirichlet_epsilon: 0.0,
            temperature: 0.0, // Greedy
            ..Self::default()
        }
    }

    /// Create a fast config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_simulations: 50,
            c_puct: 1.5,
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            temperature: 0.0,
            max_depth: 128,
        }
    }

    /// Whether root noise is mixed in at the start of a search.
    #[inline]
    pub fn noise_enabled(&self) -> bool {
        self.dirichlet_alpha > 0.0 && self.dirichlet_epsilon > 0.0
    }

    /// Builder pattern: set number of simulations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    /// Builder pattern: set c_puct exploration constant.
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    /// Builder pattern: set temperature.
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    /// Builder pattern: set root noise parameters.
    pub fn with_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Builder pattern: set the descent depth limit.
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MctsConfig::default();
        assert_eq!(config.num_simulations, 40);
        assert!((config.c_puct - 1.5).abs() < 1e-6);
        assert!(config.noise_enabled());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MctsConfig::default()
            .with_simulations(100)
            .with_temperature(0.5)
            .with_max_depth(10);

        assert_eq!(config.num_simulations, 100);
        assert!((config.temperature - 0.5).abs() < 1e-6);
        assert_eq!(config.max_depth, 10);
    }

    #[test]
    fn test_evaluation_config() {
        let config = MctsConfig::for_evaluation();
        assert!((config.dirichlet_alpha).abs() < 1e-6);
        assert!((config.temperature).abs() < 1e-6);
        assert!(!config.noise_enabled());
    }

    #[test]
    fn test_noise_needs_both_parameters() {
        assert!(!MctsConfig::for_testing().with_noise(0.3, 0.0).noise_enabled());
        assert!(MctsConfig::for_testing().with_noise(0.3, 0.25).noise_enabled());
    }
}
