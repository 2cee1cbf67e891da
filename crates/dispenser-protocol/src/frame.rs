use bytes::{BufMut, Bytes, BytesMut};
use dispenser_core::{
    BusConfig, Error, Quantity, RecipeId, RegisterIndex, Result,
    constants::{FRAME_SIZE, HALT_FRAME_SIZE, HALT_PAYLOAD, VALVES_PER_REGISTER},
};
use std::fmt;

/// Pump durations for the 8 valves of one register.
pub type RegisterDurations = [u8; VALVES_PER_REGISTER];

/// One register of one recipe, as uploaded to the board.
///
/// # Wire Format
/// ```text
/// [recipe_id, d0, d1, d2, d3, d4, d5, d6, d7, register_index]
///  ^^^^^^^^^  ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^  ^^^^^^^^^^^^^^
///  0-23       pump duration per valve         0-3
/// ```
///
/// The frame is written to bus register `recipe_base_register + register_index`.
///
/// ```
/// use dispenser_core::{RecipeId, RegisterIndex};
/// use dispenser_protocol::RecipeFrame;
///
/// let frame = RecipeFrame::new(
///     RecipeId::new(2).unwrap(),
///     RegisterIndex::new(1).unwrap(),
///     [10, 0, 0, 0, 0, 0, 0, 7],
/// );
/// assert_eq!(frame.to_bytes(), [2, 10, 0, 0, 0, 0, 0, 0, 7, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecipeFrame {
    pub recipe_id: RecipeId,
    pub register: RegisterIndex,
    pub durations: RegisterDurations,
}

impl RecipeFrame {
    pub fn new(recipe_id: RecipeId, register: RegisterIndex, durations: RegisterDurations) -> Self {
        Self {
            recipe_id,
            register,
            durations,
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0] = self.recipe_id.as_u8();
        bytes[1..=VALVES_PER_REGISTER].copy_from_slice(&self.durations);
        bytes[FRAME_SIZE - 1] = self.register.as_u8();
        bytes
    }

    /// Append the wire bytes to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(FRAME_SIZE);
        dst.put_slice(&self.to_bytes());
    }

    /// Bus register this frame is written to.
    #[must_use]
    pub fn bus_register(&self, bus: &BusConfig) -> u8 {
        bus.recipe_register(self.register)
    }

    /// Parse a recipe frame.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` if the length is wrong or the recipe id
    /// or register index is out of range.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes = exact_frame(bytes, "recipe")?;
        let recipe_id = RecipeId::new(bytes[0])
            .map_err(|e| Error::InvalidFrame(format!("recipe frame: {e}")))?;
        let register = RegisterIndex::new(bytes[FRAME_SIZE - 1])
            .map_err(|e| Error::InvalidFrame(format!("recipe frame: {e}")))?;

        let mut durations = [0u8; VALVES_PER_REGISTER];
        durations.copy_from_slice(&bytes[1..=VALVES_PER_REGISTER]);

        Ok(Self::new(recipe_id, register, durations))
    }
}

/// Request to pour `quantity` drinks of one recipe.
///
/// # Wire Format
/// ```text
/// [recipe_id, quantity, 0, 0, 0, 0, 0, 0, 0, 0]
/// ```
/// The trailing bytes are placeholders the board ignores; they keep the
/// frame the same size as recipe frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderFrame {
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
}

impl OrderFrame {
    pub fn new(recipe_id: RecipeId, quantity: Quantity) -> Self {
        Self {
            recipe_id,
            quantity,
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[0] = self.recipe_id.as_u8();
        bytes[1] = self.quantity.as_u8();
        bytes
    }

    /// # Errors
    /// Returns `Error::InvalidFrame` if the length is wrong, the recipe id is
    /// out of range or the quantity is zero.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let bytes = exact_frame(bytes, "order")?;
        let recipe_id = RecipeId::new(bytes[0])
            .map_err(|e| Error::InvalidFrame(format!("order frame: {e}")))?;
        let quantity = Quantity::new(bytes[1])
            .map_err(|e| Error::InvalidFrame(format!("order frame: {e}")))?;
        Ok(Self::new(recipe_id, quantity))
    }
}

/// One-byte dummy frame that stops an in-progress pour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HaltFrame;

impl HaltFrame {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HALT_FRAME_SIZE] {
        [HALT_PAYLOAD]
    }
}

/// Any frame the host can send, classified by the register it was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardFrame {
    Recipe(RecipeFrame),
    Order(OrderFrame),
    Halt,
}

impl BoardFrame {
    /// Interpret bytes written to `register` under the given bus layout.
    ///
    /// This is the board side of the protocol; the simulated board and test
    /// doubles use it to read back what the host transmitted.
    ///
    /// # Errors
    /// Returns `Error::InvalidFrame` if the register is unknown or the bytes
    /// do not form a valid frame for that register. A recipe frame whose
    /// trailing register byte disagrees with the bus register is rejected.
    pub fn decode(bus: &BusConfig, register: u8, bytes: &[u8]) -> Result<Self> {
        if register == bus.order_register {
            return OrderFrame::decode(bytes).map(Self::Order);
        }
        if register == bus.halt_register {
            if bytes.len() != HALT_FRAME_SIZE {
                return Err(Error::InvalidFrame(format!(
                    "halt frame must be {HALT_FRAME_SIZE} byte, got {}",
                    bytes.len()
                )));
            }
            return Ok(Self::Halt);
        }

        let offset = register.wrapping_sub(bus.recipe_base_register);
        let index = RegisterIndex::new(offset).map_err(|_| {
            Error::InvalidFrame(format!("no frame is addressed to register {register:#04x}"))
        })?;
        let frame = RecipeFrame::decode(bytes)?;
        if frame.register != index {
            return Err(Error::InvalidFrame(format!(
                "recipe frame for register {} sent to register {register:#04x}",
                frame.register
            )));
        }
        Ok(Self::Recipe(frame))
    }
}

impl fmt::Display for BoardFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipe(frame) => write!(
                f,
                "recipe {} register {} {:?}",
                frame.recipe_id, frame.register, frame.durations
            ),
            Self::Order(frame) => write!(f, "order recipe {} x{}", frame.recipe_id, frame.quantity),
            Self::Halt => write!(f, "halt"),
        }
    }
}

/// Wire bytes of a whole sequence of recipe frames, concatenated.
#[must_use]
pub fn encode_recipe_frames<'a>(frames: impl IntoIterator<Item = &'a RecipeFrame>) -> Bytes {
    let mut buffer = BytesMut::new();
    for frame in frames {
        frame.encode(&mut buffer);
    }
    buffer.freeze()
}

fn exact_frame<'a>(bytes: &'a [u8], kind: &str) -> Result<&'a [u8]> {
    if bytes.len() != FRAME_SIZE {
        return Err(Error::InvalidFrame(format!(
            "{kind} frame must be {FRAME_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn recipe(id: u8) -> RecipeId {
        RecipeId::new(id).unwrap()
    }

    #[test]
    fn test_order_frame_layout() {
        let frame = OrderFrame::new(recipe(1), Quantity::new(2).unwrap());
        assert_eq!(frame.to_bytes(), [1, 2, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_halt_frame_layout() {
        assert_eq!(HaltFrame.to_bytes(), [0x00]);
    }

    #[test]
    fn test_recipe_frame_decode() {
        let frame = RecipeFrame::decode(&[23, 1, 2, 3, 4, 5, 6, 7, 8, 3]).unwrap();
        assert_eq!(frame.recipe_id, recipe(23));
        assert_eq!(frame.register.as_u8(), 3);
        assert_eq!(frame.durations, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[rstest]
    #[case(&[0, 0, 0, 0, 0, 0, 0, 0, 0])] // too short
    #[case(&[24, 0, 0, 0, 0, 0, 0, 0, 0, 0])] // recipe id out of range
    #[case(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 4])] // register out of range
    fn test_recipe_frame_decode_invalid(#[case] bytes: &[u8]) {
        assert!(matches!(
            RecipeFrame::decode(bytes),
            Err(Error::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_order_frame_rejects_zero_quantity() {
        assert!(OrderFrame::decode(&[3, 0, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_board_frame_classification() {
        let bus = BusConfig::default();

        let order = BoardFrame::decode(&bus, 0x57, &[5, 1, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(matches!(order, BoardFrame::Order(f) if f.recipe_id == recipe(5)));

        assert_eq!(BoardFrame::decode(&bus, 0x10, &[0]).unwrap(), BoardFrame::Halt);

        let recipe_frame =
            BoardFrame::decode(&bus, 0x39, &[7, 0, 0, 0, 0, 0, 0, 0, 9, 2]).unwrap();
        assert!(matches!(recipe_frame, BoardFrame::Recipe(f) if f.durations[7] == 9));
    }

    #[test]
    fn test_board_frame_register_mismatch() {
        let bus = BusConfig::default();
        // Register byte says 2, but written to base + 1.
        let result = BoardFrame::decode(&bus, 0x38, &[7, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_board_frame_unknown_register() {
        let bus = BusConfig::default();
        assert!(BoardFrame::decode(&bus, 0x20, &[0; FRAME_SIZE]).is_err());
    }

    #[test]
    fn test_encode_recipe_frames_concatenates() {
        let frames = [
            RecipeFrame::new(recipe(0), RegisterIndex::new(0).unwrap(), [1; 8]),
            RecipeFrame::new(recipe(0), RegisterIndex::new(1).unwrap(), [2; 8]),
        ];
        let bytes = encode_recipe_frames(&frames);
        assert_eq!(bytes.len(), 2 * FRAME_SIZE);
        assert_eq!(bytes[9], 0);
        assert_eq!(bytes[10], 0);
        assert_eq!(bytes[11], 2);
        assert_eq!(bytes[19], 1);
    }
}
