//! Fan-out of incoming readings to the per-machine pipelines.

use crate::core::batching::{BatchConsumer, ModelMachine};
use crate::core::error::PipelineError;
use crate::core::hourly::StatModel;
use crate::core::messages::{MachineId, TemperatureMessage, VibrationMessage};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Routes readings to `machine1` then `machine2`.
///
/// Routing is strictly sequential: if anything fails for `machine1`,
/// `machine2` is not touched for that message. Keys for `machine2` are only
/// looked up after `machine1` has been fed, so a message missing a
/// `machine2` key still updates `machine1` before failing.
pub struct DataController {
    machine1: ModelMachine,
    machine2: ModelMachine,
    stats: Option<(StatModel, StatModel)>,
    sampling_rate: u32,
}

impl DataController {
    /// Create a controller whose two machines share one consumer.
    pub fn new(
        consumer: Arc<dyn BatchConsumer>,
        batch_size: NonZeroUsize,
        sampling_rate: u32,
    ) -> Self {
        Self {
            machine1: ModelMachine::new(MachineId::Machine1.name(), consumer.clone(), batch_size),
            machine2: ModelMachine::new(MachineId::Machine2.name(), consumer, batch_size),
            stats: None,
            sampling_rate,
        }
    }

    /// Attach hourly statistics for both machines.
    pub fn with_statistics(mut self, machine1: StatModel, machine2: StatModel) -> Self {
        self.stats = Some((machine1, machine2));
        self
    }

    /// Route a vibration message. Returns the number of batches dispatched.
    pub async fn add_vib(&mut self, message: &VibrationMessage) -> Result<usize, PipelineError> {
        let mut dispatched = 0;
        for machine in MachineId::ALL {
            let (left, right) = message.pair(machine)?;
            if self.machine_mut(machine).add_vib(left, right).await? {
                dispatched += 1;
            }
            if let Some(stats) = self.stat_model_mut(machine) {
                stats.add_vib(left, right).await?;
            }
        }
        Ok(dispatched)
    }

    /// Route a temperature message. Returns the number of batches dispatched.
    pub async fn add_temp(&mut self, message: &TemperatureMessage) -> Result<usize, PipelineError> {
        let mut dispatched = 0;
        for machine in MachineId::ALL {
            let samples = message.samples(machine)?;
            if self.machine_mut(machine).add_temp(samples).await? {
                dispatched += 1;
            }
            if let Some(stats) = self.stat_model_mut(machine) {
                stats.add_temp(samples).await?;
            }
        }
        Ok(dispatched)
    }

    pub fn machine(&self, machine: MachineId) -> &ModelMachine {
        match machine {
            MachineId::Machine1 => &self.machine1,
            MachineId::Machine2 => &self.machine2,
        }
    }

    pub fn stat_model(&self, machine: MachineId) -> Option<&StatModel> {
        self.stats.as_ref().map(|(m1, m2)| match machine {
            MachineId::Machine1 => m1,
            MachineId::Machine2 => m2,
        })
    }

    /// Buffer lengths `(vib_left, vib_right, temp)` for a machine.
    pub fn buffered(&self, machine: MachineId) -> (usize, usize, usize) {
        self.machine(machine).buffered()
    }

    /// Sampling rate of the incoming streams, in Hz. Not used for batching.
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    fn machine_mut(&mut self, machine: MachineId) -> &mut ModelMachine {
        match machine {
            MachineId::Machine1 => &mut self.machine1,
            MachineId::Machine2 => &mut self.machine2,
        }
    }

    fn stat_model_mut(&mut self, machine: MachineId) -> Option<&mut StatModel> {
        self.stats.as_mut().map(|(m1, m2)| match machine {
            MachineId::Machine1 => m1,
            MachineId::Machine2 => m2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::batching::tests::RecordingConsumer;
    use crate::core::hourly::tests::{RecordingSink, ScriptedOracle};

    fn controller(batch_size: usize) -> (DataController, Arc<RecordingConsumer>) {
        let consumer = Arc::new(RecordingConsumer::default());
        let controller =
            DataController::new(consumer.clone(), NonZeroUsize::new(batch_size).unwrap(), 1000);
        (controller, consumer)
    }

    #[tokio::test]
    async fn test_routes_to_both_machines() {
        let (mut controller, consumer) = controller(2);

        let vib = VibrationMessage::new(
            (vec![1.0, 2.0], vec![3.0, 4.0]),
            (vec![10.0, 20.0], vec![30.0, 40.0]),
        );
        assert_eq!(controller.add_vib(&vib).await.unwrap(), 0);

        let temp = TemperatureMessage::new(vec![5.0, 6.0], vec![50.0, 60.0]);
        assert_eq!(controller.add_temp(&temp).await.unwrap(), 2);

        let batches = consumer.batches.lock().unwrap();
        assert_eq!(batches[0].machine, "machine1");
        assert_eq!(batches[1].machine, "machine2");
        assert_eq!(batches[1].temp, vec![50.0, 60.0]);
        assert_eq!(controller.buffered(MachineId::Machine2), (0, 0, 0));
        assert_eq!(controller.sampling_rate(), 1000);
    }

    #[tokio::test]
    async fn test_missing_machine2_key_after_machine1_update() {
        let (mut controller, _) = controller(4);
        let message = VibrationMessage {
            machine1_left: Some(vec![1.0]),
            machine1_right: Some(vec![2.0]),
            machine2_left: None,
            machine2_right: Some(vec![3.0]),
        };

        let err = controller.add_vib(&message).await.unwrap_err();
        assert_eq!(err, PipelineError::MissingField("machine2_left".to_string()));
        assert_eq!(controller.buffered(MachineId::Machine1), (1, 1, 0));
        assert_eq!(controller.buffered(MachineId::Machine2), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_machine1_failure_skips_machine2() {
        let (mut controller, consumer) = controller(1);
        consumer.fail.store(true, std::sync::atomic::Ordering::SeqCst);

        controller
            .add_temp(&TemperatureMessage::new(vec![1.0], vec![1.0]))
            .await
            .unwrap();
        let err = controller
            .add_vib(&VibrationMessage::new((vec![1.0], vec![1.0]), (vec![2.0], vec![2.0])))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Consumer(_)));
        assert_eq!(controller.buffered(MachineId::Machine1), (1, 1, 1));
        assert_eq!(controller.buffered(MachineId::Machine2), (0, 0, 1));
    }

    #[tokio::test]
    async fn test_statistics_fed_alongside_batching() {
        let consumer = Arc::new(RecordingConsumer::default());
        let sink = Arc::new(RecordingSink::default());
        let mut controller = DataController::new(consumer, NonZeroUsize::new(8).unwrap(), 100)
            .with_statistics(
                StatModel::new("machine1", Box::new(ScriptedOracle::new(&[true])), sink.clone()),
                StatModel::new("machine2", Box::new(ScriptedOracle::new(&[])), sink.clone()),
            );

        controller
            .add_vib(&VibrationMessage::new((vec![-2.0, 4.0], vec![1.0]), (vec![7.0], vec![7.0])))
            .await
            .unwrap();

        assert_eq!(*sink.saved.lock().unwrap(), vec![("machine1".to_string(), 3.0)]);
        let stats2 = controller.stat_model(MachineId::Machine2).unwrap();
        assert_eq!(stats2.left().count(), 1);
    }
}
