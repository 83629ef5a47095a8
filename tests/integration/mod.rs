#[cfg(test)]
mod test_alert_scenarios;
#[cfg(test)]
mod test_sampling_pipeline;
#[cfg(test)]
mod test_threshold_persistence;
